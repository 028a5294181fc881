//! `login` and `logout`.

use anyhow::anyhow;
use ledgerdesk_grid::auth::Credentials;
use ledgerdesk_grid::entity::{lookup_path, value_text};
use serde::Serialize;
use serde_json::Value;

use crate::cli::LoginArgs;
use crate::client::{AppContext, CliError, CliResult, classify_problem};

const TOKEN_PATHS: [&str; 3] = ["token", "data.token", "data.access_token"];
const USER_ID_PATHS: [&str; 3] = ["user_id", "data.user.id", "data.user_id"];

#[derive(Serialize)]
struct LoginPayload<'a> {
    email: &'a str,
    password: &'a str,
}

pub(crate) async fn handle_login(ctx: &AppContext, args: LoginArgs) -> CliResult<()> {
    let email = args.email.trim();
    if email.is_empty() {
        return Err(CliError::validation("email must not be empty"));
    }
    let password = match args.password {
        Some(password) => password,
        None => rpassword::prompt_password("Password: ")
            .map_err(|err| CliError::failure(anyhow!("failed to read password: {err}")))?,
    };
    if password.is_empty() {
        return Err(CliError::validation("password must not be empty"));
    }

    let url = ctx.endpoint("login")?;
    let response = ctx
        .http
        .post(url)
        .json(&LoginPayload {
            email,
            password: &password,
        })
        .send()
        .await
        .map_err(|err| CliError::failure(anyhow!("request to /login failed: {err}")))?;
    if !response.status().is_success() {
        return Err(classify_problem(response).await);
    }
    let body: Value = response
        .json()
        .await
        .map_err(|err| CliError::failure(anyhow!("failed to parse login response: {err}")))?;

    let credentials = credentials_from(&body).ok_or_else(|| {
        CliError::failure(anyhow!("login response did not include a session token"))
    })?;
    ctx.tokens.save(&credentials).map_err(CliError::failure)?;
    ctx.session.rearm();
    tracing::info!(user_id = ?credentials.user_id, "signed in");
    println!("signed in as {email}");
    Ok(())
}

pub(crate) fn handle_logout(ctx: &AppContext) -> CliResult<()> {
    ctx.tokens.clear().map_err(CliError::failure)?;
    println!("signed out");
    Ok(())
}

fn credentials_from(body: &Value) -> Option<Credentials> {
    let first_text = |paths: &[&str]| {
        paths
            .iter()
            .filter_map(|path| lookup_path(body, path))
            .filter_map(value_text)
            .find(|text| !text.trim().is_empty())
    };
    let token = first_text(&TOKEN_PATHS)?;
    Some(Credentials::new(token, first_text(&USER_ID_PATHS)))
}
