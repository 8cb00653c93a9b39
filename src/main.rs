#[tokio::main]
async fn main() {
    if let Err(err) = artist_portfolio::run().await {
        eprintln!("startup error: {err}");
        std::process::exit(1);
    }
}
