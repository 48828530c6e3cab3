use serde_json::{json, Value};

/// Maximum document length sent to the model (characters).
const MAX_INPUT_LENGTH: usize = 30_000;

pub const EXTRACTION_SYSTEM_PROMPT: &str = "\
Du er en specialiseret assistent, der analyserer danske lønsedler. \
Du udtrækker KUN oplysninger, der står eksplicit i dokumentet, og svarer \
udelukkende med gyldig JSON.";

/// Empty payslip record with every field the model is asked to fill.
pub fn payslip_template() -> Value {
    json!({
        "metadata": {
            "periode": null,
            "cpr_nr": null,
            "navn": null,
            "adresse": null,
            "arbejdsplads": null,
            "tjenestenr": null,
            "lønseddel_nr": null,
            "overenskomst": null,
            "anciennitetsdato": null,
            "jubilæumsdato": null,
            "næste_løntrinsstigning": null,
            "område": null
        },
        "løn": {
            "grundløn": {"trin": null, "beløb": null, "timer_pr_uge": null},
            "tillæg": [],
            "fast_løn_i_alt": null,
            "særydelser": [],
            "fradrag": [],
            "samlet_løn_før_skat": null,
            "skat": {"arbejdsmarkedsbidrag": null, "trækprocent": null, "fradrag": null, "skat": null},
            "netto_udbetalt": null,
            "overførsel_dato": null
        },
        "pension": {"samlet_pensionsbidrag": null, "eget_bidrag": null, "pensionsprocent": null},
        "ferie": {
            "ferie_med_løn_saldo": null,
            "ferie_uden_løn_saldo": null,
            "6_uge": null,
            "feriegodtgørelse_fond": null,
            "feriegodtgørelse_ekstra_tj": null,
            "ferietillæg_maj": null
        },
        "afspadsering": {"saldo_start": null, "optjent_timer": null, "afholdt_timer": null, "saldo_slut": null},
        "arbejdstimer": [],
        "arbejdstimer_ics": [],
        "feriepenge": {"optjent": null, "udbetalt": null},
        "bruttolon": {"beløb": null, "heraf_pension": null},
        "a_skat": {"beløb": null, "procent": null},
        "am_bidrag": {"beløb": null, "procent": null}
    })
}

const INSTRUCTIONS: &str = r#"
# Analyseproces
1. Læs HELE lønseddelteksten grundigt igennem. Lønsedler kan have både forside og bagside.
2. Identificer alle sektioner: metadata, løndele, ferie, afspadsering og arbejdstimer fra arbejdstidsopgørelsen.
3. Teksten indeholder markører som [SEKTION:LØN], der angiver hvor en sektion sandsynligvis starter.

# Felter
## Metadata
- periode: perioden lønsedlen dækker (f.eks. "august 2024" eller "01.08-31.08.2024")
- cpr_nr: CPR-nummer i formatet XXXXXX-XXXX
- navn, adresse, arbejdsplads, tjenestenr, overenskomst, område
- lønseddel_nr: format MM/ÅÅÅÅ (f.eks. "08/2024")

## Løn
- grundløn: objekt med trin, beløb og timer_pr_uge
- tillæg: liste af {type, beløb, pensionsgivende}; pensionsgivende er true hvis beløbet er markeret med "P"
- særydelser: liste af {type, antal, sats, beløb, pensionsgivende}
- fradrag: liste af {type, beløb}; negative beløb beholder minustegnet
- samlet_løn_før_skat, netto_udbetalt, overførsel_dato
- skat: {arbejdsmarkedsbidrag, trækprocent, fradrag, skat}

## Pension, ferie og afspadsering
- pension: samlet_pensionsbidrag, eget_bidrag, pensionsprocent
- ferie: saldi og feriegodtgørelser som i skabelonen
- afspadsering: saldo_start, optjent_timer, afholdt_timer, saldo_slut ("Tilgodehavende afspadsering")

## Arbejdstimer
For hver dag i "Arbejdstidsopgørelse" eller "Optælling af timer":
- dato: YYYY-MM-DD
- arbejdstid: interval som "07:00-15:00"
- normtid: timer som tal
- fravær: fraværstype (f.eks. "Ferietimer", "Kursustimer") eller null
- tillæg: liste af {type, timer}
Registrer også dage med fravær.

## Påkrævede opsummeringsfelter
- feriepenge: {optjent (feriegodtgørelse til fond), udbetalt}
- bruttolon: {beløb (samme som samlet_løn_før_skat), heraf_pension}
- a_skat: {beløb (samme som skat.skat), procent (samme som skat.trækprocent)}
- am_bidrag: {beløb (samme som skat.arbejdsmarkedsbidrag), procent (typisk 8.0)}

# Formatering
- Alle beløb som tal uden tusindtalsadskiller og med punktum som decimaltegn.
- Fjern "P" og "*" fra beløb, men registrer betydningen i objektstrukturen.
- Manglende oplysninger sættes til null.
- Datoer i formatet YYYY-MM-DD.

Returner KUN det endelige JSON-objekt uden forklarende tekst eller kommentarer.

Lønseddeltekst:
"#;

/// Build the extraction prompt: template, instructions, then the document.
pub fn build_extraction_prompt(document_text: &str) -> String {
    let template = serde_json::to_string_pretty(&payslip_template()).unwrap_or_default();
    format!(
        "Udtræk alle nøgleoplysninger fra lønsedlen og formatér dem som JSON i nøjagtigt \
         samme struktur som denne skabelon:\n{template}\n{INSTRUCTIONS}{}\n",
        prepare_document_text(document_text)
    )
}

/// Strip invisible characters and cap the length of the document text.
pub fn prepare_document_text(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| matches!(c, ' ' | '\n' | '\t' | '\r') || !is_invisible(*c))
        .collect();

    let char_count = cleaned.chars().count();
    if char_count <= MAX_INPUT_LENGTH {
        return cleaned;
    }
    tracing::warn!(
        chars = char_count,
        max = MAX_INPUT_LENGTH,
        "Document text truncated before extraction"
    );
    cleaned.chars().take(MAX_INPUT_LENGTH).collect()
}

fn is_invisible(c: char) -> bool {
    c.is_control()
        || matches!(
            c,
            '\u{200B}'..='\u{200F}' | '\u{202A}'..='\u{202E}' | '\u{2060}'..='\u{2064}' | '\u{FEFF}'
        )
}
