//! Peer supervision
//!
//! One task per configured neighbor, keyed by its local bind address. A
//! child that dies is restarted alone; siblings keep their sessions. A
//! child that returns cleanly stays down.

// SPDX-License-Identifier: AGPL-3.0-or-later

use crate::config::PeerConfig;
use std::collections::HashMap;
use std::future::Future;
use tokio::task::{Id, JoinSet};

/// Run one session engine per neighbor and keep them running.
pub async fn run(peers: Vec<PeerConfig>) {
    supervise(peers, crate::session::run).await;
}

async fn supervise<F, Fut>(peers: Vec<PeerConfig>, mut start: F)
where
    F: FnMut(PeerConfig) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let mut children = JoinSet::new();
    let mut index: HashMap<Id, PeerConfig> = HashMap::new();
    for peer in peers {
        spawn_child(&mut children, &mut index, &mut start, peer);
    }
    while let Some(result) = children.join_next_with_id().await {
        match result {
            Ok((id, ())) => {
                if let Some(peer) = index.remove(&id) {
                    log::info!("[{}] session task finished", peer.local_address);
                }
            }
            Err(e) if e.is_panic() => {
                let Some(peer) = index.remove(&e.id()) else {
                    continue;
                };
                log::error!(
                    "[{}] session task died: {e}, restarting it",
                    peer.local_address
                );
                spawn_child(&mut children, &mut index, &mut start, peer);
            }
            Err(e) => {
                // Cancelled, not crashed
                index.remove(&e.id());
            }
        }
    }
}

fn spawn_child<F, Fut>(
    children: &mut JoinSet<()>,
    index: &mut HashMap<Id, PeerConfig>,
    start: &mut F,
    peer: PeerConfig,
) where
    F: FnMut(PeerConfig) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    log::debug!("[{}] starting session task", peer.local_address);
    let handle = children.spawn(start(peer.clone()));
    index.insert(handle.id(), peer);
}
