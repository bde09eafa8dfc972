use tokio::signal;

/// How the terminal hosting the exam page asked it to close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CloseRequest {
    Interrupt,
    Terminate,
    /// The controlling terminal went away, like a closed browser tab.
    Hangup,
}

impl CloseRequest {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            CloseRequest::Interrupt => "interrupt",
            CloseRequest::Terminate => "terminate",
            CloseRequest::Hangup => "hangup",
        }
    }
}

#[cfg(unix)]
async fn unix_signal(kind: signal::unix::SignalKind, request: CloseRequest) -> CloseRequest {
    match signal::unix::signal(kind) {
        Ok(mut stream) => {
            stream.recv().await;
            request
        }
        Err(err) => {
            tracing::error!(signal = request.as_str(), error = %err, "Failed to install signal handler");
            std::future::pending().await
        }
    }
}

/// Resolves once the process is asked to close the exam page.
pub(crate) async fn close_requested() -> CloseRequest {
    let interrupt = async {
        match signal::ctrl_c().await {
            Ok(()) => CloseRequest::Interrupt,
            Err(err) => {
                tracing::error!(error = %err, "Failed to install Ctrl+C handler");
                std::future::pending().await
            }
        }
    };

    #[cfg(unix)]
    let request = tokio::select! {
        request = interrupt => request,
        request = unix_signal(signal::unix::SignalKind::terminate(), CloseRequest::Terminate) => request,
        request = unix_signal(signal::unix::SignalKind::hangup(), CloseRequest::Hangup) => request,
    };

    #[cfg(not(unix))]
    let request = interrupt.await;

    tracing::info!(signal = request.as_str(), "Close requested; unloading exam page");
    request
}
