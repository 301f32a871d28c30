use secrecy::SecretString;

/// Immutable per-process configuration shared with every request handler.
#[derive(Clone)]
pub struct GlobalArgs {
    pub jwt_secret: SecretString,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(jwt_secret: SecretString) -> Self {
        Self { jwt_secret }
    }
}

impl std::fmt::Debug for GlobalArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalArgs")
            .field("jwt_secret", &"***")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_global_args() {
        let args = GlobalArgs::new(SecretString::from("hush"));
        assert_eq!(args.jwt_secret.expose_secret(), "hush");
        assert_eq!(format!("{args:?}"), "GlobalArgs { jwt_secret: \"***\" }");
    }
}
