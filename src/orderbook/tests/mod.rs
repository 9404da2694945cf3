#[cfg(test)]
mod modify_tests;
