#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    lexagen_server::run().await
}
