use tokio::net::TcpListener;

/// Serves the test router on `PORT` (default 3000) for poking at by hand.
#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    println!("mock upstream listening on {addr} (/echo, /inspect, /status/{{code}}, /empty/{{code}}, /slow/{{ms}}, /broken, /trickle/{{ms}}, /stream)");
    mock_server::run(listener).await
}
