use crate::simulation::{Action, Simulation};
use anyhow::Context;
use crossbeam::channel::{RecvTimeoutError, Receiver, Sender};
use sdntrace_core::{
    vlan_of, Color, ColorField, ColorService, Directory, Dpid, Manager, PacketIn, PacketTransport,
    PortNo, SwitchHandle,
};
use sdntrace_packet::ethernet::{EtherType, EthernetPacket, MacAddr, VlanPacket};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;

/// How often the delivery thread checks whether the manager has stopped.
const DELIVERY_POLL: Duration = Duration::from_millis(10);

/// A simulated network of switches.
///
/// Probes sent into the network are forwarded according to the rules of the
/// simulation and delivered back to the controller as packet-in events.
#[derive(Debug)]
pub struct SimNetwork {
    simulation: Arc<Simulation>,
    colors: HashMap<Dpid, Color>,
    packet_in: Sender<PacketIn>,
}

impl SimNetwork {
    pub fn new(simulation: Arc<Simulation>, packet_in: Sender<PacketIn>) -> anyhow::Result<Self> {
        let colors = simulation
            .switches
            .iter()
            .filter_map(|switch| switch.color.as_ref().map(|color| (switch, color)))
            .map(|(switch, color)| {
                let mac = MacAddr::from_str(color)
                    .with_context(|| format!("invalid color for switch {}", switch.dpid))?;
                Ok((
                    Dpid::from(switch.dpid.as_str()),
                    Color::new(ColorField::DlSrc, mac),
                ))
            })
            .collect::<anyhow::Result<HashMap<_, _>>>()?;
        Ok(Self {
            simulation,
            colors,
            packet_in,
        })
    }
}

impl Directory for SimNetwork {
    fn get_switch(&self, dpid: &Dpid) -> Option<SwitchHandle> {
        self.simulation
            .switches
            .iter()
            .find(|switch| switch.dpid == dpid.as_str())
            .map(|switch| SwitchHandle::new(Dpid::from(switch.dpid.as_str())))
    }

    fn get_switches(&self) -> Vec<SwitchHandle> {
        self.simulation
            .switches
            .iter()
            .map(|switch| SwitchHandle::new(Dpid::from(switch.dpid.as_str())))
            .collect()
    }
}

impl ColorService for SimNetwork {
    fn get_marker(&self, dpid: &Dpid) -> Option<Color> {
        self.colors.get(dpid).copied()
    }
}

impl PacketTransport for SimNetwork {
    fn send_probe(
        &self,
        switch: &SwitchHandle,
        port: PortNo,
        frame: &[u8],
    ) -> sdntrace_core::Result<()> {
        let vlan = vlan_of(frame);
        let Some(rule) = self.simulation.find_rule(switch.dpid.as_str(), port.0, vlan) else {
            tracing::debug!(dpid = %switch.dpid, %port, ?vlan, "no matching rule, frame dropped");
            return Ok(());
        };
        match &rule.action {
            Action::Drop => {
                tracing::debug!(dpid = %switch.dpid, %port, "frame dropped");
            }
            Action::Forward(forward) => {
                let mut frame = frame.to_vec();
                if let Some(vlan) = forward.vlan {
                    rewrite_vlan(&mut frame, vlan);
                }
                tracing::debug!(
                    from = %switch.dpid,
                    to = %forward.dpid,
                    port = forward.port,
                    "frame forwarded"
                );
                let event = PacketIn {
                    dpid: Dpid::from(forward.dpid.as_str()),
                    in_port: PortNo(forward.port),
                    frame,
                };
                self.packet_in
                    .send(event)
                    .map_err(|err| sdntrace_core::Error::SendFailed(err.to_string()))?;
            }
        }
        Ok(())
    }
}

/// Rewrite the VLAN id of a tagged frame, untagged frames are left unchanged.
fn rewrite_vlan(frame: &mut [u8], vlan: u16) {
    let tagged = EthernetPacket::new_view(frame)
        .is_ok_and(|eth| eth.get_ether_type() == EtherType::Vlan);
    if !tagged {
        return;
    }
    if let Ok(mut tag) = VlanPacket::new(&mut frame[EthernetPacket::minimum_packet_size()..]) {
        tag.set_vlan_id(vlan);
    }
}

/// Deliver packet-in events to the manager until it is stopped.
pub fn deliver(
    manager: Manager,
    packet_in: Receiver<PacketIn>,
) -> anyhow::Result<JoinHandle<()>> {
    let handle = thread::Builder::new()
        .name(String::from("sdntrace-sim-network"))
        .spawn(move || loop {
            match packet_in.recv_timeout(DELIVERY_POLL) {
                Ok(event) => {
                    manager.handle_packet_in(event);
                }
                Err(RecvTimeoutError::Timeout) if !manager.is_stopped() => {}
                Err(_) => break,
            }
        })?;
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel::unbounded;
    use sdntrace_core::{build_probe, FlowDescriptor, RequestId, Step, TraceMsg};
    use serde_json::json;

    const SIM: &str = r#"
name = "network"

[[switches]]
dpid = "1"
color = "ee:ee:ee:ee:ee:01"

[[switches]]
dpid = "2"

[[rules]]
dpid = "1"
in_port = 1
action = { tag = "Forward", dpid = "2", port = 5, vlan = 300 }

[[rules]]
dpid = "2"
in_port = 5
action = { tag = "Drop" }

[[traces]]
name = "unused"
reason = "done"
request = {}
"#;

    fn network() -> (SimNetwork, Receiver<PacketIn>) {
        let sim: Simulation = toml::from_str(SIM).unwrap();
        let (tx, rx) = unbounded();
        (SimNetwork::new(Arc::new(sim), tx).unwrap(), rx)
    }

    fn probe(dpid: &str, in_port: u64) -> (PortNo, Vec<u8>) {
        let request = json!({
            "trace": {"switch": {"dpid": dpid, "in_port": in_port}, "eth": {"dl_vlan": 100}}
        });
        let flow = FlowDescriptor::from_request(&request, Duration::from_secs(1)).unwrap();
        let color = Color::new(ColorField::DlSrc, MacAddr([0xee; 6]));
        build_probe(&flow, &color, &TraceMsg::new(RequestId(30001), Step(0)))
    }

    #[test]
    fn test_directory_and_colors() {
        let (network, _) = network();
        assert_eq!(2, network.get_switches().len());
        assert!(network.get_switch(&Dpid::from("2")).is_some());
        assert!(network.get_switch(&Dpid::from("3")).is_none());
        assert!(network.get_marker(&Dpid::from("1")).is_some());
        assert!(network.get_marker(&Dpid::from("2")).is_none());
    }

    #[test]
    fn test_forward_rewrites_vlan() {
        let (network, rx) = network();
        let (port, frame) = probe("1", 1);
        network
            .send_probe(&SwitchHandle::new(Dpid::from("1")), port, &frame)
            .unwrap();
        let event = rx.try_recv().unwrap();
        assert_eq!(Dpid::from("2"), event.dpid);
        assert_eq!(PortNo(5), event.in_port);
        assert_eq!(Some(300), vlan_of(&event.frame));
        assert_eq!(frame.len(), event.frame.len());
    }

    #[test]
    fn test_drop_and_unmatched() {
        let (network, rx) = network();
        let (port, frame) = probe("2", 5);
        network
            .send_probe(&SwitchHandle::new(Dpid::from("2")), port, &frame)
            .unwrap();
        let (port, frame) = probe("2", 6);
        network
            .send_probe(&SwitchHandle::new(Dpid::from("2")), port, &frame)
            .unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_invalid_color() {
        let mut sim: Simulation = toml::from_str(SIM).unwrap();
        sim.switches[1].color = Some(String::from("not a mac"));
        let (tx, _rx) = unbounded();
        assert!(SimNetwork::new(Arc::new(sim), tx).is_err());
    }
}
