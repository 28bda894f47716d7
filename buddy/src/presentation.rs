//! The surface through which a user is invited to approve a request in their
//! wallet.
//!
//! Only the show/hide lifecycle is defined here. Rendering is up to the
//! presenter: a popup, a deep link, or just a line on a terminal.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use url::Url;

/// Native wallets register this scheme.
const DEEP_LINK_PREFIX: &str = "connex:sign?src=";
/// Hosted wallet used when no wallet id is configured.
const LITE_WALLET_URL: &str = "https://lite.sync.vecha.in/";

/// Characters a URI component keeps verbatim besides ASCII alphanumerics, as
/// browsers' `encodeURIComponent` does.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

pub trait PresentationHandle: Send + Sync {
    /// Makes the surface visible. Calling it again while visible is a no-op.
    fn show(&self);

    /// Removes the surface. Safe to call when it was never shown.
    fn hide(&self);
}

pub trait Presenter: Send + Sync {
    /// Prepares a surface pointing the wallet at `request_src`. Nothing is
    /// displayed until [`PresentationHandle::show`] is called.
    fn connect(&self, request_src: &Url, wallet_id: Option<&str>) -> Box<dyn PresentationHandle>;
}

/// Places a wallet can be sent to for a given request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletLinks {
    /// Opens an installed native wallet.
    pub deep_link: String,
    /// Signing page of the browser extension wallet if a wallet id is known,
    /// otherwise of the hosted lite wallet.
    pub wallet_page: String,
}

pub fn wallet_links(request_src: &Url, wallet_id: Option<&str>) -> WalletLinks {
    let encoded_src = utf8_percent_encode(request_src.as_str(), URI_COMPONENT).to_string();
    let wallet_base = match wallet_id {
        Some(id) => format!("chrome-extension://{id}/www/index.html"),
        None => LITE_WALLET_URL.to_string(),
    };
    WalletLinks {
        deep_link: format!("{DEEP_LINK_PREFIX}{encoded_src}"),
        wallet_page: format!("{wallet_base}#/sign?src={encoded_src}"),
    }
}

/// Presenter for environments without any UI.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadlessPresenter;

struct HeadlessHandle;

impl PresentationHandle for HeadlessHandle {
    fn show(&self) {}

    fn hide(&self) {}
}

impl Presenter for HeadlessPresenter {
    fn connect(&self, _request_src: &Url, _wallet_id: Option<&str>) -> Box<dyn PresentationHandle> {
        Box::new(HeadlessHandle)
    }
}

type Sink = Arc<Mutex<dyn Write + Send>>;

/// Prints wallet links when the surface is shown. Hiding prints nothing: the
/// session may end for reasons the surface does not know about.
#[derive(Clone)]
pub struct TerminalPresenter {
    out: Sink,
}

impl Default for TerminalPresenter {
    fn default() -> Self {
        Self::with_writer(Arc::new(Mutex::new(std::io::stderr())))
    }
}

impl TerminalPresenter {
    pub fn with_writer(out: Sink) -> Self {
        Self { out }
    }
}

struct TerminalHandle {
    links: WalletLinks,
    out: Sink,
    visible: AtomicBool,
}

impl TerminalHandle {
    fn print_prompt(&self) -> std::io::Result<()> {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(out, "Approve the request in your wallet:")?;
        writeln!(out, "  native wallet: {}", self.links.deep_link)?;
        writeln!(out, "  web wallet:    {}", self.links.wallet_page)?;
        out.flush()
    }
}

impl PresentationHandle for TerminalHandle {
    fn show(&self) {
        if self.visible.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(err) = self.print_prompt() {
            tracing::warn!(?err, "could not print wallet links");
        }
    }

    fn hide(&self) {
        self.visible.store(false, Ordering::SeqCst);
    }
}

impl Presenter for TerminalPresenter {
    fn connect(&self, request_src: &Url, wallet_id: Option<&str>) -> Box<dyn PresentationHandle> {
        Box::new(TerminalHandle {
            links: wallet_links(request_src, wallet_id),
            out: self.out.clone(),
            visible: AtomicBool::new(false),
        })
    }
}
