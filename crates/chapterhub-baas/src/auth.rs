use reqwest::Method;
use serde_json::{Value, json};
use tracing::{debug, info};

use chapterhub_types::api::{AuthUser, Session};

use crate::{Baas, Result, check_status, read_json};

/// Client for the backend's auth service (`/auth/v1`).
pub struct AuthClient<'a> {
    baas: &'a Baas,
}

/// Signup either signs the user in straight away or waits on email confirmation.
#[derive(Debug)]
pub enum SignUp {
    Session(Session),
    PendingConfirmation(AuthUser),
}

impl<'a> AuthClient<'a> {
    pub(crate) fn new(baas: &'a Baas) -> Self {
        Self { baas }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.baas
            .http()
            .request(method, format!("{}/auth/v1{}", self.baas.url(), path))
            .header("apikey", self.baas.anon_key())
    }

    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        debug!("Password sign-in for {}", email);
        let resp = self
            .request(Method::POST, "/token")
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        read_json(resp).await
    }

    pub async fn refresh_session(&self, refresh_token: &str) -> Result<Session> {
        let resp = self
            .request(Method::POST, "/token")
            .query(&[("grant_type", "refresh_token")])
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await?;
        read_json(resp).await
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: Option<&str>,
    ) -> Result<SignUp> {
        let mut body = json!({ "email": email, "password": password });
        if let Some(name) = full_name {
            body["data"] = json!({ "full_name": name });
        }

        let resp = self
            .request(Method::POST, "/signup")
            .json(&body)
            .send()
            .await?;
        let value: Value = read_json(resp).await?;

        if value.get("access_token").is_some() {
            let session: Session = serde_json::from_value(value)?;
            info!("Signed up and signed in {}", session.user.id);
            return Ok(SignUp::Session(session));
        }

        // Without auto-confirm the service answers with the bare user object.
        let user_value = value.get("user").cloned().unwrap_or(value);
        let user: AuthUser = serde_json::from_value(user_value)?;
        info!("Signed up {}; awaiting email confirmation", user.id);
        Ok(SignUp::PendingConfirmation(user))
    }

    pub async fn sign_out(&self, access_token: &str) -> Result<()> {
        let resp = self
            .request(Method::POST, "/logout")
            .bearer_auth(access_token)
            .send()
            .await?;
        check_status(resp).await
    }
}
