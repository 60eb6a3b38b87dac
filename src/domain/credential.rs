use std::fmt;

/// The remote account a batch is delivered to.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential {
    pub user: String,
    pub pass: String,
}

impl Credential {
    pub fn new(user: impl Into<String>, pass: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            pass: pass.into(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("user", &self.user)
            .field("pass", &"<redacted>")
            .finish()
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:<redacted>", self.user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_compares_user_and_pass_separately() {
        assert_eq!(Credential::new("u", "p"), Credential::new("u", "p"));
        assert_ne!(Credential::new("a:b", "c"), Credential::new("a", "b:c"));
        assert_ne!(Credential::new("u", "p"), Credential::new("u", "q"));
    }

    #[test]
    fn test_pass_is_redacted() {
        let credential = Credential::new("user@example.com", "s3cret");
        assert!(!format!("{credential:?}").contains("s3cret"));
        assert!(!credential.to_string().contains("s3cret"));
    }
}
