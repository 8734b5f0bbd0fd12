//! `control-socket`: the command channel's socket description.

use crate::channel::SocketDescriptor;
use crate::document::ConfigNode;
use crate::error::ValidationError;
use crate::srv_config::SrvConfig;

use super::ConfigParser;

pub struct ControlSocketParser;

impl ConfigParser for ControlSocketParser {
    fn parse(&self, node: &ConfigNode, staged: &mut SrvConfig) -> Result<(), ValidationError> {
        node.check_keys("control-socket", &["socket-type", "socket-name"])?;

        let type_node = node.require("socket-type")?;
        let socket_type = type_node.as_str("socket-type")?;
        if socket_type != "unix" {
            return Err(ValidationError::invalid(
                format!(
                    "unsupported 'socket-type' value '{}', only 'unix' is supported",
                    socket_type
                ),
                type_node.position(),
            ));
        }

        let name_node = node.require("socket-name")?;
        let socket_name = name_node.as_str("socket-name")?;
        if socket_name.is_empty() {
            return Err(ValidationError::invalid(
                "'socket-name' must not be empty",
                name_node.position(),
            ));
        }

        staged.control_socket = Some(SocketDescriptor {
            socket_type: socket_type.to_string(),
            socket_name: socket_name.to_string(),
        });
        Ok(())
    }
}
