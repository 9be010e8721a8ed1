use crate::util::{client, print_response};

pub async fn run(api_url: &str) -> i32 {
    print_response(client().get(format!("{api_url}/health")).send().await).await
}
