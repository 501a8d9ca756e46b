use std::collections::HashMap;

use dashmap::DashMap;
use tokio::sync::mpsc::Sender;

/// Topic = video identifier
pub type TopicKey = String;

/// Identifies one delivery endpoint inside the broker
pub type EndpointId = u64;

/// Mapping: Topic → endpoints registered under it
pub type Registry<E> = DashMap<TopicKey, HashMap<EndpointId, Sender<E>>>;
