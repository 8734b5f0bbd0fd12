//! `expired-leases-processing`: lease reclamation timing.

use serde::Serialize;

use crate::document::ConfigNode;
use crate::error::ValidationError;
use crate::srv_config::SrvConfig;

use super::ConfigParser;

/// Lease reclamation settings. Times are in seconds except
/// `max_reclaim_time`, which is in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ExpirationConfig {
    pub reclaim_timer_wait_time: u16,
    pub flush_reclaimed_timer_wait_time: u16,
    pub hold_reclaimed_time: u32,
    pub max_reclaim_leases: u32,
    pub max_reclaim_time: u16,
    pub unwarned_reclaim_cycles: u16,
}

impl Default for ExpirationConfig {
    fn default() -> Self {
        Self {
            reclaim_timer_wait_time: 10,
            flush_reclaimed_timer_wait_time: 25,
            hold_reclaimed_time: 3600,
            max_reclaim_leases: 100,
            max_reclaim_time: 250,
            unwarned_reclaim_cycles: 5,
        }
    }
}

pub struct ExpirationConfigParser;

impl ConfigParser for ExpirationConfigParser {
    fn parse(&self, node: &ConfigNode, staged: &mut SrvConfig) -> Result<(), ValidationError> {
        node.check_keys(
            "expired-leases-processing",
            &[
                "reclaim-timer-wait-time",
                "flush-reclaimed-timer-wait-time",
                "hold-reclaimed-time",
                "max-reclaim-leases",
                "max-reclaim-time",
                "unwarned-reclaim-cycles",
            ],
        )?;
        staged.expiration = ExpirationConfig {
            reclaim_timer_wait_time: node.get_u16("reclaim-timer-wait-time")?,
            flush_reclaimed_timer_wait_time: node.get_u16("flush-reclaimed-timer-wait-time")?,
            hold_reclaimed_time: node.get_u32("hold-reclaimed-time")?,
            max_reclaim_leases: node.get_u32("max-reclaim-leases")?,
            max_reclaim_time: node.get_u16("max-reclaim-time")?,
            unwarned_reclaim_cycles: node.get_u16("unwarned-reclaim-cycles")?,
        };
        Ok(())
    }
}
