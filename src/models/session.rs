use galleria_api_structs::SessionDescriptor;

/// The signed-in user as seen by the gallery. Owned by whoever composes the view; the
/// sync core only reads the capability flags and flips `has_s3_config` after a save.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthSession {
    pub user_id: i64,
    pub email: String,
    pub name: String,
    pub picture_url: Option<String>,
    pub access_token: Option<String>,
    pub has_s3_config: bool,
    pub has_drive_access: bool,
}

impl AuthSession {
    pub fn new(descriptor: SessionDescriptor, access_token: Option<String>) -> Self {
        AuthSession {
            user_id: descriptor.user_id,
            email: descriptor.email,
            name: descriptor.name,
            picture_url: descriptor.picture_url,
            access_token,
            has_s3_config: descriptor.has_s3_config,
            has_drive_access: false,
        }
    }

    /// Access token usable for drive replication, if the user granted it.
    pub fn drive_token(&self) -> Option<&str> {
        match (&self.access_token, self.has_drive_access) {
            (Some(token), true) if !token.is_empty() => Some(token.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> SessionDescriptor {
        SessionDescriptor {
            user_id: 7,
            email: "ada@example.com".into(),
            name: "Ada".into(),
            picture_url: None,
            has_s3_config: false,
        }
    }

    #[test]
    fn drive_token_requires_access_grant() {
        let mut session = AuthSession::new(descriptor(), Some("tok".into()));
        assert_eq!(session.drive_token(), None);

        session.has_drive_access = true;
        assert_eq!(session.drive_token(), Some("tok"));

        session.access_token = None;
        assert_eq!(session.drive_token(), None);
    }
}
