use async_trait::async_trait;
use serde::Serialize;
use shared::{
    domain::Profile,
    protocol::{AuthReply, LoginRequest},
};
use tracing::debug;

use crate::{
    dispatch::RequestDispatcher,
    error::{AuthError, LOGIN_REJECTED_FALLBACK},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginGrant {
    pub credential: String,
    pub profile: Profile,
}

#[async_trait]
pub trait RemoteAuthority: Send + Sync {
    async fn login(&self, username: &str, password: &str) -> Result<LoginGrant, AuthError>;
    async fn verify(&self, credential: &str) -> Result<(), AuthError>;
    async fn logout(&self, credential: &str) -> Result<(), AuthError>;
}

pub struct HttpAuthority {
    dispatcher: RequestDispatcher,
}

impl HttpAuthority {
    pub fn new(dispatcher: RequestDispatcher) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl RemoteAuthority for HttpAuthority {
    async fn login(&self, username: &str, password: &str) -> Result<LoginGrant, AuthError> {
        let reply: AuthReply = self
            .dispatcher
            .post_json(
                "auth/login",
                &LoginRequest {
                    username: username.to_string(),
                    password: password.to_string(),
                },
                None,
            )
            .await?;

        if !reply.success {
            return Err(AuthError::Rejected(
                reply
                    .error
                    .unwrap_or_else(|| LOGIN_REJECTED_FALLBACK.to_string()),
            ));
        }
        match (reply.token, reply.user) {
            (Some(credential), Some(profile)) if !credential.is_empty() => {
                Ok(LoginGrant { credential, profile })
            }
            _ => Err(AuthError::Transport(
                "login reply is missing the token or user profile".to_string(),
            )),
        }
    }

    async fn verify(&self, credential: &str) -> Result<(), AuthError> {
        let reply: AuthReply = self
            .dispatcher
            .post_json("auth/verify", &EmptyBody {}, Some(credential))
            .await?;
        if reply.success {
            Ok(())
        } else {
            Err(AuthError::Rejected(
                reply
                    .error
                    .unwrap_or_else(|| "credential is no longer valid".to_string()),
            ))
        }
    }

    async fn logout(&self, credential: &str) -> Result<(), AuthError> {
        let reply: AuthReply = self
            .dispatcher
            .post_json("auth/logout", &EmptyBody {}, Some(credential))
            .await?;
        debug!(success = reply.success, "remote logout acknowledged");
        Ok(())
    }
}

#[derive(Serialize)]
struct EmptyBody {}
