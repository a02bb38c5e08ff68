use std::net::SocketAddr;

use anyhow::Result;
use futures::stream::{FuturesUnordered, StreamExt};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1 as http;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::sync::watch;

use inboxd_notify::sse;

use crate::context::Context;

pub struct Server {
    bind_addr: SocketAddr,
    ctx: Context,
}

pub fn new(bind_addr: SocketAddr, ctx: Context) -> Server {
    Server { bind_addr, ctx }
}

fn text_body(status: StatusCode, txt: &'static str) -> Response<BoxBody<Bytes, std::io::Error>> {
    Response::builder()
        .status(status)
        .body(BoxBody::new(Full::new(Bytes::from(txt)).map_err(|e| match e {})))
        .expect("static response always builds")
}

/// Routes `GET /users/:user/updates` to the SSE drain loop; anything else is
/// a 404.
async fn route(
    req: Request<Incoming>,
    ctx: Context,
) -> Result<Response<BoxBody<Bytes, std::io::Error>>, http::Error> {
    let path = req.uri().path().to_string();
    let user = path
        .strip_prefix("/users/")
        .and_then(|rest| rest.strip_suffix("/updates"))
        .and_then(|id| id.parse().ok());

    match (req.method(), user) {
        (&hyper::Method::GET, Some(user)) => sse::serve(req, user, ctx.db.clone(), ctx.notify.clone()).await,
        (&hyper::Method::GET, None) => Ok(text_body(StatusCode::NOT_FOUND, "not found")),
        _ => Ok(text_body(StatusCode::METHOD_NOT_ALLOWED, "method not allowed")),
    }
}

impl Server {
    pub async fn run(self, mut must_exit: watch::Receiver<bool>) -> Result<()> {
        let tcp = TcpListener::bind(self.bind_addr).await?;
        tracing::info!(addr = %self.bind_addr, "updates server listening");

        let mut connections = FuturesUnordered::new();
        while !*must_exit.borrow() {
            let wait_conn_finished = async {
                if connections.is_empty() {
                    futures::future::pending().await
                } else {
                    connections.next().await
                }
            };
            let (socket, remote_addr) = tokio::select! {
                a = tcp.accept() => a?,
                _ = wait_conn_finished => continue,
                _ = must_exit.changed() => continue,
            };
            tracing::debug!(addr = %remote_addr, "accepted connection");

            let ctx = self.ctx.clone();
            let conn = tokio::spawn(async move {
                let stream = TokioIo::new(socket);
                match http::Builder::new()
                    .serve_connection(
                        stream,
                        service_fn(move |req| {
                            let ctx = ctx.clone();
                            async move {
                                match route(req, ctx).await {
                                    Ok(resp) => Ok(resp),
                                    Err(e) => {
                                        tracing::error!(err=?e, "routing error");
                                        Ok(text_body(StatusCode::INTERNAL_SERVER_ERROR, "internal error"))
                                    }
                                }
                            }
                        }),
                    )
                    .await
                {
                    Err(e) => tracing::warn!(err=?e, "connection failed"),
                    Ok(()) => tracing::trace!("connection terminated with success"),
                }
            });
            connections.push(conn);
        }
        drop(tcp);

        tracing::info!("updates server shutting down, draining remaining connections...");
        while connections.next().await.is_some() {}

        Ok(())
    }
}
