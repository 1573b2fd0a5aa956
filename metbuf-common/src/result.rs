pub type Result<T> = std::result::Result<T, crate::error::Error>;

#[macro_export]
macro_rules! verify_arg {
    ($name:expr, $expr:expr) => {{
        let result = $expr;
        $crate::result::verify_arg(result, stringify!($name), stringify!($expr))?;
    }};
}

#[macro_export]
macro_rules! verify_data {
    ($name:expr, $expr:expr) => {{
        let result = $expr;
        $crate::result::verify_data(result, stringify!($name), stringify!($expr))?;
    }};
}

pub fn verify_arg(predicate: bool, name: &str, condition: &str) -> Result<()> {
    if predicate {
        Ok(())
    } else {
        Err(crate::error::Error::invalid_arg(name, condition))
    }
}

pub fn verify_data(predicate: bool, name: &str, condition: &str) -> Result<()> {
    if predicate {
        Ok(())
    } else {
        Err(crate::error::Error::invalid_data(name, condition))
    }
}
