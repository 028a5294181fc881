//! Binary entrypoint for the ledgerdesk console.

#[tokio::main]
async fn main() {
    let exit_code = ledgerdesk_cli::run().await;
    std::process::exit(exit_code);
}
