use std::{
    fmt,
    fmt::{Debug, Display},
};

/// A wrapper around sensitive values (card numbers, CVVs, API secrets) that redacts the value in `Debug` and
/// `Display` output. The only way to get at the inner value is an explicit call to [`Secret::reveal`].
#[derive(Clone, Default)]
pub struct Secret<T>
where T: Clone + Default
{
    value: T,
}

impl<T: Clone + Default> Secret<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }

    pub fn reveal(&self) -> &T {
        &self.value
    }
}

impl<T: Clone + Default> Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}

impl<T: Clone + Default> Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn secrets_are_redacted_in_output() {
        let pan = Secret::new("4242424242424242".to_string());
        assert_eq!(format!("{pan}"), "****");
        assert_eq!(format!("{pan:?}"), "****");
        assert_eq!(pan.reveal(), "4242424242424242");
    }
}
