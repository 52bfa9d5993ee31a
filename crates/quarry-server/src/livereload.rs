//! WebSocket live reload: a broadcast hub and the browser client script.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Path of the live reload WebSocket endpoint.
pub const LIVERELOAD_PATH: &str = "/__livereload";

/// Path the client script is served from.
pub const LIVERELOAD_SCRIPT_PATH: &str = "/__livereload.js";

/// Messages sent to connected browsers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReloadMessage {
    /// An output file changed
    Changed {
        /// Path relative to the output root, `/`-separated
        path: String,
    },

    /// Reload the page; sent to a client that missed messages
    Reload,

    /// Connection established
    Connected,
}

/// Hub for broadcasting reload messages to all connected clients.
#[derive(Debug, Clone)]
pub struct ReloadHub {
    sender: broadcast::Sender<ReloadMessage>,
}

impl ReloadHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }

    /// Send a message to all connected clients.
    pub fn send(&self, msg: ReloadMessage) {
        // No receivers is fine
        let _ = self.sender.send(msg);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadMessage> {
        self.sender.subscribe()
    }
}

/// Next message for one client, or `None` once the hub is gone.
///
/// A client that fell behind gets a single `Reload` in place of the
/// messages it missed.
pub async fn next_message(rx: &mut broadcast::Receiver<ReloadMessage>) -> Option<ReloadMessage> {
    match rx.recv().await {
        Ok(msg) => Some(msg),
        Err(broadcast::error::RecvError::Lagged(missed)) => {
            tracing::warn!("Live reload client missed {} message(s), reloading", missed);
            Some(ReloadMessage::Reload)
        }
        Err(broadcast::error::RecvError::Closed) => None,
    }
}

impl Default for ReloadHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Insert the client script tag before `</body>`, or append it.
pub fn inject_client(html: &str) -> String {
    let tag = format!("<script src=\"{}\"></script>", LIVERELOAD_SCRIPT_PATH);

    match html.rfind("</body>") {
        Some(pos) => format!("{}{}\n{}", &html[..pos], tag, &html[pos..]),
        None => format!("{}\n{}", html, tag),
    }
}

/// Browser side of live reload. Stylesheet changes swap the matching
/// `<link>` in place; anything else reloads the page.
pub fn client_script() -> String {
    format!(
        r#"
(function() {{
  'use strict';

  var url = (location.protocol === 'https:' ? 'wss://' : 'ws://') + location.host + '{}';
  var ws = new WebSocket(url);

  function refreshStylesheet(path) {{
    var found = false;
    document.querySelectorAll('link[rel="stylesheet"]').forEach(function(link) {{
      var href = link.getAttribute('href') || '';
      if (href.split('?')[0].replace(/^\//, '') === path) {{
        link.setAttribute('href', path + '?t=' + Date.now());
        found = true;
      }}
    }});
    return found;
  }}

  ws.onmessage = function(event) {{
    var msg = JSON.parse(event.data);

    switch (msg.type) {{
      case 'changed':
        console.log('[livereload]', msg.path);
        if (/\.css$/.test(msg.path) && refreshStylesheet(msg.path)) {{
          break;
        }}
        location.reload();
        break;

      case 'reload':
        location.reload();
        break;

      case 'connected':
        console.log('[livereload] Connected');
        break;
    }}
  }};

  ws.onclose = function() {{
    console.log('[livereload] Disconnected, retrying');
    setTimeout(function() {{ location.reload(); }}, 1000);
  }};
}})();
"#,
        LIVERELOAD_PATH
    )
}
