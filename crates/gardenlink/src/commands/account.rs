//! Login and registration handlers.

use dialoguer::Input;
use secrecy::SecretString;

use gardenlink_config::PASSWORD_ENV;
use gardenlink_core::{Authenticator, Identity, Registration};

use crate::cli::{GlobalOpts, RegisterArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

use super::util;

fn identity_detail(identity: &Identity) -> String {
    let mut lines = vec![format!("Signed in as {}", identity.username)];
    if let Some(ref email) = identity.email {
        lines.push(format!("  Email:  {email}"));
    }
    if let Some(ref id) = identity.user_id {
        lines.push(format!("  Id:     {id}"));
    }
    lines.push(format!("  Role:   {}", identity.role));
    lines.join("\n")
}

pub async fn login(global: &GlobalOpts) -> Result<(), CliError> {
    let (_, _, session) = util::authenticate(global).await?;
    let out = output::render_single(
        &global.output,
        session.identity(),
        identity_detail,
        |i| i.username.clone(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn register(args: RegisterArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let connection = config::resolve_connection(global)?;
    let auth = Authenticator::new(connection.build_client()?);

    let username = match args.username {
        Some(u) => u,
        None => Input::new()
            .with_prompt("Username")
            .interact_text()
            .map_err(util::prompt_err)?,
    };
    let email = match global.email.clone() {
        Some(e) => e,
        None => Input::new()
            .with_prompt("Email")
            .interact_text()
            .map_err(util::prompt_err)?,
    };

    // Scripts hand the password over through the environment; there is
    // nothing to confirm against in that case.
    let (password, confirm) = if let Ok(pw) = std::env::var(PASSWORD_ENV) {
        (pw.clone(), pw)
    } else {
        let pw = rpassword::prompt_password("Password: ").map_err(util::prompt_err)?;
        let confirm = rpassword::prompt_password("Confirm password: ").map_err(util::prompt_err)?;
        (pw, confirm)
    };

    let form = Registration {
        username,
        email,
        password: SecretString::from(password),
        confirm: SecretString::from(confirm),
    };
    auth.register(&form).await?;

    if !global.quiet {
        eprintln!("✓ Account created for {}", form.username.trim());
        eprintln!("  Sign in with: gardenlink login --email {}", form.email.trim());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gardenlink_core::{Role, UserId};

    #[test]
    fn identity_detail_lists_known_fields() {
        let identity = Identity {
            user_id: Some(UserId::new("7")),
            username: "ana".into(),
            email: Some("ana@example.com".into()),
            role: Role::Admin,
        };
        let text = identity_detail(&identity);
        assert!(text.starts_with("Signed in as ana"));
        assert!(text.contains("Role:   admin"));
        assert!(text.contains("Id:     7"));
    }
}
