use llmux::error::Result;

#[actix_web::main]
async fn main() -> Result<()> {
    llmux::server::run_server().await
}
