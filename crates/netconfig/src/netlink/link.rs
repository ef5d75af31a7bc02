//! Link queries and attribute changes.

use super::connection::{Connection, ack_request};
use super::error::Result;
use super::message::NlMsgType;
use super::messages::LinkMessage;
use super::types::{IfInfoMsg, iff, ifla};

impl Connection {
    /// Dump all network interfaces.
    pub async fn get_links(&self) -> Result<Vec<LinkMessage>> {
        self.dump_typed(NlMsgType::RTM_GETLINK).await
    }

    /// Set the administrative state of an interface by index.
    pub async fn set_link_state_by_index(&self, ifindex: u32, up: bool) -> Result<()> {
        let mut ifinfo = IfInfoMsg::new().with_index(ifindex as i32);
        ifinfo.ifi_flags = if up { iff::UP } else { 0 };
        ifinfo.ifi_change = iff::UP;

        let mut builder = ack_request(NlMsgType::RTM_NEWLINK);
        builder.append(&ifinfo);

        let state = if up { "up" } else { "down" };
        self.request_ack(builder)
            .await
            .map_err(|e| e.with_context(format!("set link {} {}", ifindex, state)))
    }

    /// Set the hardware address of an interface by index.
    pub async fn set_link_address_by_index(&self, ifindex: u32, address: [u8; 6]) -> Result<()> {
        let mut builder = ack_request(NlMsgType::RTM_NEWLINK);
        builder.append(&IfInfoMsg::new().with_index(ifindex as i32));
        builder.append_attr(ifla::ADDRESS, &address);

        self.request_ack(builder)
            .await
            .map_err(|e| e.with_context(format!("set address of link {}", ifindex)))
    }

    /// Rename an interface by index. The kernel refuses this while the link is up.
    pub async fn set_link_name_by_index(&self, ifindex: u32, name: &str) -> Result<()> {
        let mut builder = ack_request(NlMsgType::RTM_NEWLINK);
        builder.append(&IfInfoMsg::new().with_index(ifindex as i32));
        builder.append_attr_str(ifla::IFNAME, name);

        self.request_ack(builder)
            .await
            .map_err(|e| e.with_context(format!("rename link {} to {}", ifindex, name)))
    }
}
