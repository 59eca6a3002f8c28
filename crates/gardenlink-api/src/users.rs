// User management endpoints (admin accounts only: the server enforces
// this too, the client-side gate lives in core).

use secrecy::SecretString;

use crate::client::{ApiResponse, GardenClient};
use crate::error::Error;

impl GardenClient {
    /// `GET /users/`
    pub async fn list_users(&self, token: &SecretString) -> Result<ApiResponse, Error> {
        self.get(&["users", ""], Some(token)).await
    }

    /// `DELETE /users/{id}/`
    pub async fn delete_user(&self, token: &SecretString, user_id: &str) -> Result<ApiResponse, Error> {
        self.delete(&["users", user_id, ""], Some(token)).await
    }
}
