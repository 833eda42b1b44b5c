//! Authorization failures

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PermissionError {
    #[error("missing permission '{required}'")]
    InsufficientPermission { required: String },

    #[error("requires one of roles: {}", .required.join(", "))]
    InsufficientRole { required: Vec<String> },
}

impl PermissionError {
    #[must_use]
    pub const fn public_detail(&self) -> &'static str {
        match self {
            Self::InsufficientPermission { .. } => "Insufficient permissions",
            Self::InsufficientRole { .. } => "Insufficient role",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_never_names_the_permission() {
        let err = PermissionError::InsufficientPermission {
            required: "delete:tenants".into(),
        };
        assert!(err.to_string().contains("delete:tenants"));
        assert!(!err.public_detail().contains("delete"));

        let err = PermissionError::InsufficientRole {
            required: vec!["admin".into(), "owner".into()],
        };
        assert_eq!(err.to_string(), "requires one of roles: admin, owner");
    }
}
