use std::time::Duration;

use canvas::connection::{ConnectionCore, ConnectionError, Inbound};
use canvas::consts::WS_PATH;
use clap::{Args, Parser, Subcommand};
use futures_util::{SinkExt, StreamExt};
use protocol::{DEFAULT_STROKE_COLOR, DrawingData, StrokeSegment, WhiteboardId};
use serde_json::Value;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;

type WsStream = tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("invalid point `{0}`; expected x,y")]
    InvalidPoint(String),
    #[error("a stroke needs at least two points")]
    TooFewPoints,
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned HTTP {status}: {message}")]
    Server { status: u16, message: String },
    #[error("websocket error: {0}")]
    Ws(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("websocket closed")]
    WsClosed,
    #[error("timed out waiting for subscription confirmation")]
    Timeout,
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

impl From<tokio_tungstenite::tungstenite::Error> for CliError {
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Ws(Box::new(error))
    }
}

#[derive(Parser, Debug)]
#[command(name = "drawboard-cli", about = "Drawboard whiteboard API and drawing channel CLI")]
struct Cli {
    #[arg(long, env = "DRAWBOARD_BASE_URL", default_value = "http://127.0.0.1:3000")]
    base_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the server is up.
    Ping,
    /// List whiteboards.
    List,
    /// Show one whiteboard.
    Show { whiteboard_id: String },
    /// Create a whiteboard.
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Join a whiteboard and print every drawing payload as a JSON line.
    Watch(WatchArgs),
    /// Publish a polyline as chained stroke segments.
    Stroke(StrokeArgs),
    /// Clear a whiteboard for every subscriber.
    Clear(TargetArgs),
}

#[derive(Args, Debug)]
struct TargetArgs {
    /// Whiteboard to join; omit for the server's default whiteboard.
    #[arg(long)]
    whiteboard_id: Option<String>,

    #[arg(long, default_value_t = 5)]
    timeout_secs: u64,
}

impl TargetArgs {
    fn requested(&self) -> Option<WhiteboardId> {
        self.whiteboard_id.as_deref().map(WhiteboardId::new)
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Args, Debug)]
struct WatchArgs {
    #[command(flatten)]
    target: TargetArgs,

    /// Exit when the connection drops instead of reconnecting.
    #[arg(long, default_value_t = false)]
    once: bool,
}

#[derive(Args, Debug)]
struct StrokeArgs {
    #[command(flatten)]
    target: TargetArgs,

    /// Polyline vertex as `x,y` in bitmap pixels; repeat for each point.
    #[arg(long = "point", required = true, allow_hyphen_values = true)]
    points: Vec<String>,

    #[arg(long, default_value = DEFAULT_STROKE_COLOR)]
    color: String,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    let base_url = cli.base_url;

    match cli.command {
        Command::Ping => run_ping(&base_url).await,
        Command::List => {
            let json = api_request(&base_url, reqwest::Method::GET, "/api/whiteboards", None).await?;
            print_json(&json)
        }
        Command::Show { whiteboard_id } => {
            let path = format!("/api/whiteboards/{whiteboard_id}");
            let json = api_request(&base_url, reqwest::Method::GET, &path, None).await?;
            print_json(&json)
        }
        Command::Create { name, description } => {
            let body = serde_json::json!({ "name": name, "description": description });
            let json = api_request(&base_url, reqwest::Method::POST, "/api/whiteboards", Some(body)).await?;
            print_json(&json)
        }
        Command::Watch(args) => run_watch(&base_url, args).await,
        Command::Stroke(args) => run_stroke(&base_url, args).await,
        Command::Clear(target) => run_clear(&base_url, target).await,
    }
}

// =============================================================================
// REST
// =============================================================================

async fn run_ping(base_url: &str) -> Result<(), CliError> {
    let url = format!("{}/up", base_url.trim_end_matches('/'));
    let response = reqwest::Client::new().get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(CliError::Server { status: status.as_u16(), message: "health check failed".to_owned() });
    }
    println!("ok");
    Ok(())
}

async fn api_request(
    base_url: &str,
    method: reqwest::Method,
    path: &str,
    body: Option<Value>,
) -> Result<Value, CliError> {
    let url = format!("{}{}", base_url.trim_end_matches('/'), path);
    let request = reqwest::Client::new().request(method, &url);
    let request = if let Some(json) = body { request.json(&json) } else { request };

    let response = request.send().await?;
    let status = response.status();
    let value = response.json::<Value>().await.unwrap_or(Value::Null);

    if !status.is_success() {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| value.to_string(), ToOwned::to_owned);
        return Err(CliError::Server { status: status.as_u16(), message });
    }

    Ok(value)
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

// =============================================================================
// DRAWING CHANNEL
// =============================================================================

async fn run_watch(base_url: &str, args: WatchArgs) -> Result<(), CliError> {
    let url = ws_url(base_url)?;
    let mut core = ConnectionCore::new(args.target.requested());

    loop {
        let outcome = match join(&url, &mut core, args.target.timeout()).await {
            Ok(mut stream) => print_broadcasts(&mut stream, &mut core).await,
            Err(error) => Err(error),
        };

        match outcome {
            Err(CliError::Connection(error @ ConnectionError::Rejected { .. })) => return Err(error.into()),
            Err(error) if args.once => return Err(error),
            Ok(()) if args.once => return Ok(()),
            Err(error) => eprintln!("connection lost: {error}"),
            Ok(()) => eprintln!("connection closed"),
        }

        let Some(delay) = core.on_closed() else {
            return Ok(());
        };
        eprintln!("reconnecting in {} ms", delay.as_millis());
        tokio::time::sleep(delay).await;
    }
}

async fn run_stroke(base_url: &str, args: StrokeArgs) -> Result<(), CliError> {
    let points = args.points.iter().map(|raw| parse_point(raw)).collect::<Result<Vec<_>, _>>()?;
    let segments = segments_from_points(&points, &args.color)?;

    let mut core = ConnectionCore::new(args.target.requested());
    let mut stream = join(&ws_url(base_url)?, &mut core, args.target.timeout()).await?;
    let count = segments.len();
    for segment in segments {
        publish(&mut stream, &core, DrawingData::Segment(segment)).await?;
    }
    close(&mut stream).await;

    eprintln!("published {count} segments");
    Ok(())
}

async fn run_clear(base_url: &str, target: TargetArgs) -> Result<(), CliError> {
    let mut core = ConnectionCore::new(target.requested());
    let mut stream = join(&ws_url(base_url)?, &mut core, target.timeout()).await?;
    publish(&mut stream, &core, DrawingData::Clear).await?;
    close(&mut stream).await;

    eprintln!("cleared");
    Ok(())
}

/// Connect, subscribe and wait for the server to confirm the join.
async fn join(url: &str, core: &mut ConnectionCore, timeout: Duration) -> Result<WsStream, CliError> {
    core.on_connecting();
    let (mut stream, _) = connect_async(url).await?;
    stream.send(Message::text(core.on_open())).await?;

    let whiteboard_id = tokio::time::timeout(timeout, await_confirmation(&mut stream, core))
        .await
        .map_err(|_| CliError::Timeout)??;
    eprintln!("joined whiteboard {whiteboard_id}");
    Ok(stream)
}

async fn await_confirmation(stream: &mut WsStream, core: &mut ConnectionCore) -> Result<WhiteboardId, CliError> {
    loop {
        let text = recv_text(stream).await?;
        match core.on_text(&text) {
            Ok(Some(Inbound::Joined(id))) => return Ok(id),
            Ok(_) => {}
            Err(ConnectionError::Codec(error)) => eprintln!("dropping malformed frame: {error}"),
            Err(error) => return Err(error.into()),
        }
    }
}

async fn print_broadcasts(stream: &mut WsStream, core: &mut ConnectionCore) -> Result<(), CliError> {
    loop {
        let text = match recv_text(stream).await {
            Ok(text) => text,
            Err(CliError::WsClosed) => return Ok(()),
            Err(error) => return Err(error),
        };
        match core.on_text(&text) {
            Ok(Some(Inbound::Remote(data))) => println!("{}", Value::from(data)),
            Ok(_) => {}
            Err(ConnectionError::Codec(error)) => eprintln!("dropping malformed frame: {error}"),
            Err(error) => return Err(error.into()),
        }
    }
}

async fn publish(stream: &mut WsStream, core: &ConnectionCore, data: DrawingData) -> Result<(), CliError> {
    let Some(text) = core.outbound(data) else {
        return Err(CliError::WsClosed);
    };
    stream.send(Message::text(text)).await?;
    Ok(())
}

async fn close(stream: &mut WsStream) {
    if let Err(error) = stream.close(None).await {
        eprintln!("websocket close failed: {error}");
    }
}

async fn recv_text(stream: &mut WsStream) -> Result<String, CliError> {
    loop {
        let Some(message) = stream.next().await else {
            return Err(CliError::WsClosed);
        };
        match message? {
            Message::Text(text) => return Ok(text.as_str().to_owned()),
            Message::Close(_) => return Err(CliError::WsClosed),
            _ => {}
        }
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn ws_url(base_url: &str) -> Result<String, CliError> {
    let base = base_url.trim_end_matches('/');
    if let Some(rest) = base.strip_prefix("http://") {
        return Ok(format!("ws://{rest}{WS_PATH}"));
    }
    if let Some(rest) = base.strip_prefix("https://") {
        return Ok(format!("wss://{rest}{WS_PATH}"));
    }

    Err(CliError::InvalidBaseUrl(base_url.to_owned()))
}

fn parse_point(raw: &str) -> Result<(f64, f64), CliError> {
    let invalid = || CliError::InvalidPoint(raw.to_owned());
    let (x, y) = raw.split_once(',').ok_or_else(invalid)?;
    let x = x.trim().parse::<f64>().map_err(|_| invalid())?;
    let y = y.trim().parse::<f64>().map_err(|_| invalid())?;
    if !x.is_finite() || !y.is_finite() {
        return Err(invalid());
    }
    Ok((x, y))
}

/// Chain consecutive points into segments the way a drag on the canvas would.
fn segments_from_points(points: &[(f64, f64)], color: &str) -> Result<Vec<StrokeSegment>, CliError> {
    if points.len() < 2 {
        return Err(CliError::TooFewPoints);
    }
    Ok(points
        .windows(2)
        .map(|pair| StrokeSegment::new(pair[0].0, pair[0].1, pair[1].0, pair[1].1, color))
        .collect())
}
