//! User management handlers (admin).

use tabled::Tabled;

use gardenlink_core::{Coordinator, UserId, UserRecord};

use crate::cli::{GlobalOpts, UsersArgs, UsersCommand};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct UserRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Username")]
    username: String,
    #[tabled(rename = "Email")]
    email: String,
    #[tabled(rename = "Role")]
    role: String,
}

fn user_row(u: &UserRecord) -> UserRow {
    UserRow {
        id: u.id.to_string(),
        username: u.username.clone(),
        email: u.email.clone(),
        role: u.role.to_string(),
    }
}

pub async fn handle(args: UsersArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let coordinator = util::sign_in(global, |_| {}).await?;
    let result = match args.command {
        UsersCommand::List => list(&coordinator, global).await,
        UsersCommand::Delete { id } => delete(&coordinator, global, id).await,
    };
    util::sign_out(&coordinator).await;
    result
}

async fn list(coordinator: &Coordinator, global: &GlobalOpts) -> Result<(), CliError> {
    let users = coordinator.list_users().await?;
    let out = output::render_list(&global.output, &users, user_row, |u| u.id.to_string());
    output::print_output(&out, global.quiet);
    Ok(())
}

async fn delete(coordinator: &Coordinator, global: &GlobalOpts, id: String) -> Result<(), CliError> {
    if !util::confirm(
        &format!("Delete user '{id}'? This cannot be undone."),
        "users delete",
        global.yes,
    )? {
        return Ok(());
    }
    coordinator.delete_user(UserId::new(id.clone())).await?;
    if !global.quiet {
        eprintln!("✓ User {id} deleted");
    }
    Ok(())
}
