//! Global scalars read after dispatch: `decline-probation-period` and
//! `dhcp4o6-port`.

use crate::document::ConfigNode;
use crate::error::ValidationError;
use crate::srv_config::SrvConfig;

use super::ConfigParser;

/// Runs over the whole document rather than a single key.
pub struct GlobalParametersParser;

impl ConfigParser for GlobalParametersParser {
    fn parse(&self, root: &ConfigNode, staged: &mut SrvConfig) -> Result<(), ValidationError> {
        if let Some(period) = root.opt_u32("decline-probation-period")? {
            staged.decline_probation_period = period;
        }
        if let Some(port) = root.get("dhcp4o6-port") {
            staged.dhcp4o6_port = port.as_int_in("dhcp4o6-port", 0, u16::MAX as i64)? as u16;
        }
        Ok(())
    }
}
