use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};

use crate::error::ApiError;
use crate::models::{AppState, UserType};
use crate::scheduling::Caller;

#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: i64,
    pub user_type: UserType,
}

impl AuthContext {
    pub fn caller(&self) -> Caller {
        Caller {
            user_id: self.user_id,
            user_type: self.user_type,
        }
    }
}

impl FromRequestParts<AppState> for AuthContext {
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            // Extract Authorization: Bearer <token>
            let TypedHeader(authz): TypedHeader<Authorization<Bearer>> =
                TypedHeader::from_request_parts(parts, state)
                    .await
                    .map_err(|rejection| {
                        if rejection.is_missing() {
                            ApiError::missing_token()
                        } else {
                            ApiError::invalid_token()
                        }
                    })?;

            let (user_id, user_type) = state.tokens.verify(authz.token()).map_err(|e| {
                tracing::debug!(error = %e, "bearer token rejected");
                ApiError::invalid_token()
            })?;

            Ok(AuthContext { user_id, user_type })
        }
    }
}
