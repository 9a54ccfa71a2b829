use tokio::net::TcpListener;

/// Serves both surfaces on one address; point `GATEWAY_URL` and
/// `GATEWAY_URL_V2` at it.
#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    let addr = std::env::var("MOCK_GATEWAY_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".to_string());
    let listener = TcpListener::bind(&addr).await?;
    let url = format!("http://{}", listener.local_addr()?);
    println!("mock gateway listening on {url}");
    println!("  export GATEWAY_URL={url} GATEWAY_URL_V2={url}");
    mock_server::run(listener).await
}
