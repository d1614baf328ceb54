/// Two-head feed-forward regression network.
pub mod flood_network;
