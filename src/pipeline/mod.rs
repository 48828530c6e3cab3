pub mod import;
pub mod extraction;
pub mod record;
pub mod structuring;
pub mod validation;
pub mod diagnostic; // Intermediate artifact dump (debug mode or PAYTJEK_DUMP_DIR)
pub mod processor;
