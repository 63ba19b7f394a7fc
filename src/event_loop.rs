//! The async driver: one task that owns the manager, the link, the protocol
//! deadline, and the outbound pacing.

use std::time::Duration;

use mavlink::common::{self, MavMessage};
use mavlink::MavHeader;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::command::Command;
use crate::error::ManagerError;
use crate::manager::{AutopilotKind, WaypointManager};
use crate::mission::item::MissionItem;
use crate::mission::wire::{self, SenderId};

/// Channel pair bridging the manager to an external MAVLink codec. The
/// manager consumes decoded messages and emits structured ones; framing and
/// CRC live on the far side of these channels.
pub struct LinkChannels {
    pub outbound: mpsc::Sender<MavMessage>,
    pub inbound: mpsc::Receiver<(MavHeader, MavMessage)>,
}

/// Bridge a live MAVLink connection (e.g. `udpin:0.0.0.0:14550`) into a
/// [`LinkChannels`] pair. The bridge task ends when either side closes.
pub async fn connect(
    address: &str,
    gcs_system_id: u8,
    gcs_component_id: u8,
) -> Result<LinkChannels, ManagerError> {
    let connection = mavlink::connect_async::<common::MavMessage>(address)
        .await
        .map_err(|err| ManagerError::ConnectionFailed(err.to_string()))?;

    let (out_tx, mut out_rx) = mpsc::channel::<MavMessage>(32);
    let (in_tx, in_rx) = mpsc::channel(64);

    tokio::spawn(async move {
        loop {
            tokio::select! {
                outbound = out_rx.recv() => {
                    let Some(message) = outbound else { break };
                    let header = MavHeader {
                        system_id: gcs_system_id,
                        component_id: gcs_component_id,
                        sequence: 0,
                    };
                    if let Err(err) = connection.send(&header, &message).await {
                        warn!("MAVLink send error: {err}");
                        break;
                    }
                }
                inbound = connection.recv() => {
                    match inbound {
                        Ok(pair) => {
                            if in_tx.send(pair).await.is_err() {
                                break;
                            }
                        }
                        Err(err) => {
                            warn!("MAVLink recv error: {err}");
                            break;
                        }
                    }
                }
            }
        }
    });

    Ok(LinkChannels {
        outbound: out_tx,
        inbound: in_rx,
    })
}

/// Writer side of the list snapshots published to clients.
pub(crate) struct ListWatches {
    pub editable: watch::Sender<Vec<MissionItem>>,
    pub view_only: watch::Sender<Vec<MissionItem>>,
}

pub(crate) async fn run_event_loop(
    mut manager: WaypointManager,
    mut link: LinkChannels,
    mut command_rx: mpsc::Receiver<Command>,
    watches: ListWatches,
    cancel: CancellationToken,
) {
    let timeout = Duration::from_millis(manager.retry_policy().timeout_ms);
    let gap = Duration::from_millis(manager.retry_policy().min_send_gap_ms);
    let mut deadline: Option<Instant> = None;
    let mut seen_generation = manager.timer_generation();
    let mut last_send: Option<Instant> = None;

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("event loop cancelled");
                break;
            }
            Some(command) = command_rx.recv() => {
                if matches!(command, Command::Shutdown) {
                    debug!("event loop shutdown requested");
                    break;
                }
                handle_command(command, &mut manager);
            }
            inbound = link.inbound.recv() => {
                match inbound {
                    Some((header, message)) => dispatch_inbound(&mut manager, &header, &message),
                    None => {
                        warn!("link closed");
                        break;
                    }
                }
            }
            _ = sleep_until_opt(deadline), if deadline.is_some() => {
                manager.handle_timer_expired();
            }
        }

        // Transmit whatever the manager queued, no two messages closer than
        // the minimum gap.
        for command in manager.take_outbox() {
            if let Some(previous) = last_send {
                tokio::time::sleep_until(previous + gap).await;
            }
            match wire::encode_command(
                &command,
                manager.target_system(),
                manager.target_component(),
            ) {
                Ok(message) => {
                    if link.outbound.send(message).await.is_err() {
                        warn!("link closed while sending");
                        cancel.cancel();
                        break;
                    }
                    last_send = Some(Instant::now());
                }
                Err(err) => warn!(%err, "dropping unencodable message"),
            }
        }

        // Re-arm the protocol deadline when the machine restarted its timer;
        // rejected messages leave the generation (and the deadline) alone.
        if manager.timer_armed() {
            if manager.timer_generation() != seen_generation {
                seen_generation = manager.timer_generation();
                deadline = Some(Instant::now() + timeout);
            }
        } else {
            seen_generation = manager.timer_generation();
            deadline = None;
        }

        publish_snapshot(&watches.editable, manager.items());
        publish_snapshot(&watches.view_only, manager.view_only_items());
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

fn publish_snapshot(watch: &watch::Sender<Vec<MissionItem>>, items: &[MissionItem]) {
    watch.send_if_modified(|snapshot| {
        if snapshot.as_slice() != items {
            *snapshot = items.to_vec();
            true
        } else {
            false
        }
    });
}

fn dispatch_inbound(manager: &mut WaypointManager, header: &MavHeader, message: &MavMessage) {
    if let Some((sender, event)) = wire::decode_message(header, message) {
        manager.handle_event(sender, event);
        return;
    }
    let sender = SenderId {
        system_id: header.system_id,
        component_id: header.component_id,
    };
    match message {
        MavMessage::HEARTBEAT(data) => {
            manager.handle_heartbeat(sender, AutopilotKind::from_mav(data.autopilot));
        }
        MavMessage::LOCAL_POSITION_NED(data) => {
            manager.handle_local_position(data.x as f64, data.y as f64, data.z as f64);
        }
        MavMessage::GLOBAL_POSITION_INT(data) => {
            manager.handle_global_position(
                data.lat as f64 / 1e7,
                data.lon as f64 / 1e7,
                data.alt as f64 / 1000.0,
            );
        }
        _ => {}
    }
}

fn handle_command(command: Command, manager: &mut WaypointManager) {
    match command {
        Command::ReadFromVehicle {
            read_to_edit,
            reply,
        } => {
            let _ = reply.send(manager.read_from_vehicle(read_to_edit));
        }
        Command::WriteToVehicle { reply } => {
            let _ = reply.send(manager.write_to_vehicle());
        }
        Command::ClearOnVehicle { reply } => {
            let _ = reply.send(manager.clear_on_vehicle());
        }
        Command::SetCurrentOnVehicle { seq, reply } => {
            let _ = reply.send(manager.set_current_on_vehicle(seq));
        }
        Command::Goto { item, reply } => {
            let _ = reply.send(manager.goto(&item));
        }
        Command::CreateItem {
            enforce_first_active,
            reply,
        } => {
            let _ = reply.send(manager.create_item(enforce_first_active));
        }
        Command::AddEditable {
            item,
            enforce_first_active,
            reply,
        } => {
            let _ = reply.send(manager.add_editable(item, enforce_first_active));
        }
        Command::Remove { seq, reply } => {
            let _ = reply.send(manager.remove(seq));
        }
        Command::MoveItem { from, to, reply } => {
            let _ = reply.send(manager.move_item(from, to));
        }
        Command::ClearEditable { reply } => {
            manager.clear_editable();
            let _ = reply.send(());
        }
        Command::SetCurrentEditable { seq, reply } => {
            let _ = reply.send(manager.set_current_editable(seq));
        }
        Command::Save { path, reply } => {
            manager.save(&path);
            let _ = reply.send(());
        }
        Command::Load { path, reply } => {
            let _ = reply.send(manager.load(&path));
        }
        Command::SetDefaultRelAltitude { altitude, reply } => {
            manager.set_default_rel_altitude(altitude);
            let _ = reply.send(());
        }
        Command::Shutdown => {}
    }
}
