//! Routes commands to cluster nodes and classifies what comes back.
//!
//! Each call to [`RequestExecutor::execute`] walks its own copy of the
//! topology snapshot:
//!
//! 1. start at the snapshot's preferred node (none at all is
//!    [`Error::NoAvailableNodes`]);
//! 2. build the request once and send it with the per-call timeout;
//! 3. a response that is not a node failure is handed to the command and the
//!    outcome, success or terminal error, is returned as is;
//! 4. a transport error, a timeout, 408 or 5xx moves on to the next node,
//!    wrapping around once, until every node was tried or the attempt ceiling
//!    is reached.
//!
//! Dropping the returned future cancels the pending send.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::command::Command;
use crate::commands::GetTopologyCommand;
use crate::config::ClientConfig;
use crate::error::{Error, FailureReason, NodeFailure, Result, TransportError};
use crate::topology::{Topology, TopologyCache};
use crate::transport::{HttpTransport, Transport};
use crate::wire::{ErrorResponse, ResponseBody, WireRequest, WireResponse};

pub struct RequestExecutor<T> {
    transport: T,
    topology: TopologyCache,
    config: ClientConfig,
}

impl RequestExecutor<HttpTransport> {
    pub fn http(config: ClientConfig) -> Result<Self> {
        Self::new(config, HttpTransport::new())
    }
}

impl<T: Transport> RequestExecutor<T> {
    /// Builds an executor whose initial topology is the configured urls.
    pub fn new(config: ClientConfig, transport: T) -> Result<Self> {
        config.validate()?;
        let topology = Topology::from_urls(&config.database, config.urls.iter().cloned());
        Ok(Self {
            transport,
            topology: TopologyCache::new(topology),
            config,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Snapshot of the topology new calls will be routed over.
    pub fn topology(&self) -> Arc<Topology> {
        self.topology.snapshot()
    }

    /// Replaces the whole topology. Calls already in flight are unaffected.
    pub fn update_topology(&self, topology: Topology) {
        info!(
            etag = topology.etag(),
            nodes = topology.nodes().len(),
            "topology replaced"
        );
        self.topology.replace(topology);
    }

    /// Fetches the topology from the cluster and installs it if it is newer.
    pub async fn refresh_topology(&self) -> Result<bool> {
        let command = GetTopologyCommand::new(self.config.database.as_str());
        let topology = self.execute(&command).await?;
        let (etag, nodes) = (topology.etag(), topology.nodes().len());

        let replaced = self.topology.replace_if_newer(topology);
        if replaced {
            info!(etag, nodes, "topology refreshed");
        } else {
            debug!(etag, "topology unchanged");
        }
        Ok(replaced)
    }

    pub async fn execute<C: Command>(&self, command: &C) -> Result<C::Output> {
        self.execute_with_timeout(command, self.config.request_timeout())
            .await
    }

    pub async fn execute_with_timeout<C: Command>(
        &self,
        command: &C,
        timeout: Duration,
    ) -> Result<C::Output> {
        let topology = self.topology.snapshot();
        let nodes = topology.nodes();
        let Some(mut current) = topology.preferred() else {
            return Err(Error::NoAvailableNodes);
        };

        let request = command.build()?;
        let ceiling = self.config.max_attempts.unwrap_or(nodes.len());
        let mut failures: Vec<NodeFailure> = Vec::new();

        loop {
            let node = current.value();
            debug!(
                command = command.name(),
                node = %node.url,
                attempt = failures.len() + 1,
                "sending request"
            );

            let reason =
                match tokio::time::timeout(timeout, self.transport.send(node, &request)).await {
                    Err(_) => FailureReason::Transport(TransportError::Timeout(timeout)),
                    Ok(Err(err)) => FailureReason::Transport(err),
                    Ok(Ok(response)) if response.is_node_failure() => {
                        FailureReason::Status(Box::new(node_failure_response(
                            &request, response, &node.url,
                        )))
                    }
                    Ok(Ok(response)) => {
                        // The node answered for itself; later calls start here.
                        topology.set_preferred(current.index());
                        return command
                            .parse(&request, response)
                            .map_err(|err| err.attach_node(&node.url));
                    }
                };

            let failure = NodeFailure {
                node: node.url.clone(),
                reason,
            };
            if !command.is_retryable() {
                warn!(command = command.name(), %failure, "node failed, command is not retryable");
                return Err(Error::NodeUnavailable(failure));
            }
            warn!(command = command.name(), %failure, "node failed, failing over");
            failures.push(failure);

            if failures.len() >= nodes.len() {
                return Err(Error::AllNodesFailed { failures });
            }
            if failures.len() >= ceiling {
                return Err(Error::AttemptLimitReached { failures });
            }

            current = match current.next().or_else(|| nodes.first()) {
                Some(next) => next,
                None => return Err(Error::AllNodesFailed { failures }),
            };
        }
    }
}

fn node_failure_response(request: &WireRequest, response: WireResponse, url: &str) -> ErrorResponse {
    let body = ResponseBody::from_response(&response)
        .ok()
        .flatten()
        .unwrap_or_default();
    let mut failure = ErrorResponse::new(
        format!("node answered {}", response.status),
        body,
        request,
        response,
    );
    failure.node = Some(url.to_string());
    failure
}
