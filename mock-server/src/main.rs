use mock_server::{new_db, Probe, ServerState};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let username = std::env::var("MOCK_USERNAME").unwrap_or_else(|_| "administrator".to_string());
    let password = std::env::var("MOCK_PASSWORD").unwrap_or_else(|_| "administrator".to_string());
    let state = ServerState::new(&username, &password).with_probe(Probe {
        id: 1,
        probe_type: "Kubernetes".to_string(),
        category: "Cloud Native".to_string(),
    });

    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    println!("listening on {addr}");
    mock_server::run(listener, new_db(state)).await
}
