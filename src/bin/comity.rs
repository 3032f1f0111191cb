//! Provides the `comity-inspect` tool for walking a window frame's
//! accessibility tree the way an assistive technology client does.
//!
//! Usage: `comity-inspect [--layout <file> | --hwnd <handle>] [--pretty] [--navigate] [-v]`
//!
//! Builds the frame accessible over a scripted window (or, on Windows, a live
//! one), exposes it as a native `IAccessible` and queries it only through its
//! vtables, printing JSON.
//!
//! # Examples
//! ```text
//! comity-inspect --pretty --navigate
//! comity-inspect --layout dialog.json
//! comity-inspect --hwnd 0x2041a --navigate
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

use comity::accessibility::{
    frame_accessible, AccessibleClient, AccessibleTarget, NavDirection, Role, States,
};
use comity::com::{object, IAccessible, IDispatch, InterfaceExt};
use comity::dispatch::DispatchClient;
use comity::window::{FramePart, Rect, ScriptedWindow, WindowHandle, WindowHost, WindowLayout};

#[derive(Parser)]
#[command(name = "comity-inspect")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Walk a window frame's accessibility tree through native vtables")]
struct Cli {
    /// JSON window layout (defaults to a built-in document window)
    #[arg(short, long, conflicts_with = "hwnd")]
    layout: Option<PathBuf>,

    /// Inspect a live window instead (hexadecimal or decimal handle)
    #[arg(long, value_parser = parse_handle)]
    hwnd: Option<WindowHandle>,

    /// Pretty-print the JSON report
    #[arg(long)]
    pretty: bool,

    /// Include the navigation matrix between frame parts
    #[arg(long)]
    navigate: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Serialize)]
struct Report {
    window: WindowHandle,
    frame: Node,
    children: Vec<Node>,
    dispatch_ids: BTreeMap<&'static str, i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    navigation: Option<Vec<Step>>,
}

#[derive(Serialize)]
struct Node {
    child_id: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    part: Option<FramePart>,
    name: Option<String>,
    role: Role,
    role_name: &'static str,
    state: States,
    bounds: Rect,
    #[serde(skip_serializing_if = "Option::is_none")]
    shortcut: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    default_action: Option<String>,
}

#[derive(Serialize)]
struct Step {
    from: FramePart,
    direction: NavDirection,
    to: Option<FramePart>,
}

/// Members resolved through `GetIDsOfNames` for the report.
const DISPATCH_MEMBERS: [&str; 6] = [
    "accName",
    "accRole",
    "accState",
    "accNavigate",
    "accHitTest",
    "accDoDefaultAction",
];

fn parse_handle(text: &str) -> Result<WindowHandle, String> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => isize::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed
        .map(WindowHandle)
        .map_err(|e| format!("invalid window handle {text:?}: {e}"))
}

#[cfg(windows)]
fn live_window(handle: WindowHandle) -> Result<Arc<dyn WindowHost>> {
    Ok(Arc::new(comity::platform::Win32Window::new(handle)))
}

#[cfg(not(windows))]
fn live_window(_handle: WindowHandle) -> Result<Arc<dyn WindowHost>> {
    anyhow::bail!("--hwnd requires Windows")
}

fn scripted_window(path: Option<&PathBuf>) -> Result<Arc<dyn WindowHost>> {
    let layout = match path {
        Some(path) => WindowLayout::load(path)
            .with_context(|| format!("failed to load layout {}", path.display()))?,
        None => WindowLayout::sample(),
    };
    tracing::debug!(handle = ?layout.handle, parts = layout.parts.len(), "layout loaded");
    Ok(Arc::new(ScriptedWindow::new(layout)))
}

fn node(client: &AccessibleClient, child_id: i32) -> Result<Node> {
    let role = client.role(child_id)?;
    Ok(Node {
        child_id,
        part: FramePart::from_child_id(child_id),
        name: client.name(child_id)?,
        role,
        role_name: role.name(),
        state: client.state(child_id)?,
        bounds: client.location(child_id)?,
        shortcut: client.keyboard_shortcut(child_id)?,
        default_action: client.default_action(child_id)?,
    })
}

/// Maps a navigation result back to the part it reached.
fn part_of(target: &AccessibleTarget, parts: &[(FramePart, IDispatch)]) -> Option<FramePart> {
    match target {
        AccessibleTarget::Object(object) => parts
            .iter()
            .find(|(_, p)| p.same_object(object))
            .map(|(part, _)| *part),
        AccessibleTarget::Child(id) => FramePart::from_child_id(*id),
        AccessibleTarget::Nothing | AccessibleTarget::SelfId => None,
    }
}

fn navigation(client: &AccessibleClient) -> Result<Vec<Step>> {
    let mut parts = Vec::new();
    for part in FramePart::ALL {
        if let Some(object) = client.child(part.child_id())? {
            parts.push((part, object));
        }
    }

    let mut steps = Vec::new();
    for part in FramePart::ALL {
        for direction in NavDirection::ALL {
            if matches!(direction, NavDirection::FirstChild | NavDirection::LastChild) {
                continue;
            }
            let target = client
                .navigate(direction, part.child_id())
                .with_context(|| format!("navigating {direction:?} from {part:?}"))?;
            steps.push(Step {
                from: part,
                direction,
                to: part_of(&target, &parts),
            });
        }
    }
    Ok(steps)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("comity=debug"),
        _ => EnvFilter::new("comity=trace"),
    };
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let window = match cli.hwnd {
        Some(handle) => live_window(handle)?,
        None => scripted_window(cli.layout.as_ref())?,
    };
    let handle = window.handle();
    let frame = frame_accessible(window, None);
    let native = object::expose_as::<IAccessible, _>(frame).context("failed to expose the frame")?;

    let client = AccessibleClient::new(native);
    let dispatch = DispatchClient::new(client.as_ptr().query_interface::<IDispatch>()?);

    let count = client.child_count()?;
    let children = (1..=count)
        .map(|id| node(&client, id).with_context(|| format!("querying child {id}")))
        .collect::<Result<Vec<_>>>()?;

    let mut dispatch_ids = BTreeMap::new();
    for member in DISPATCH_MEMBERS {
        let ids = dispatch
            .ids_of_names(&[member])
            .with_context(|| format!("resolving {member}"))?;
        if let Some(&id) = ids.first() {
            dispatch_ids.insert(member, id);
        }
    }

    let report = Report {
        window: handle,
        frame: node(&client, 0).context("querying the frame")?,
        children,
        dispatch_ids,
        navigation: if cli.navigate {
            Some(navigation(&client)?)
        } else {
            None
        },
    };

    let json = if cli.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{json}");
    Ok(())
}
