pub mod auth;
pub mod fetch;
pub mod gql;
pub mod seed;
pub mod sync;

use worksync_core::ApiResponse;

/// Print the response body as pretty JSON on stdout.
pub fn print_response(response: &ApiResponse) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(&response.body)?);
    Ok(())
}
