mod csv_tests;
mod engine_tests;
mod invariant_tests;
