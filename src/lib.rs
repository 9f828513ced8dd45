pub mod domain;
pub mod protocol;
pub mod shell;

#[cfg(test)]
mod test_support;
