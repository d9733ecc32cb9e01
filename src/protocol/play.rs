//! `PLAY` stage handlers.
//!
//! Input packets become [`PlayerAction`]s and go to the scheduler; nothing
//! here waits on the simulation.

use tracing::trace;

use crate::error::{constants, ProtocolError, Result};
use crate::protocol::dispatcher::HandlerContext;
use crate::protocol::packets::ServerboundPacket;
use crate::service::scheduler::WorldTask;
use crate::service::world::PlayerAction;

pub fn handle_keep_alive(ctx: &mut HandlerContext<'_>, id: i32) -> Result<()> {
    trace!(addr = %ctx.session.address(), id, "Keep-alive acknowledged");
    ctx.session.touch_keepalive();
    Ok(())
}

pub fn handle_player_input(ctx: &mut HandlerContext<'_>, packet: ServerboundPacket) -> Result<()> {
    let player = ctx
        .session
        .player_id()
        .ok_or_else(|| ProtocolError::violation(constants::ERR_NOT_AUTHENTICATED))?;
    let action = to_action(packet)?;
    ctx.server
        .scheduler
        .submit(WorldTask::Action { player, action })
}

fn to_action(packet: ServerboundPacket) -> Result<PlayerAction> {
    let action = match packet {
        ServerboundPacket::ChatMessage { message } => PlayerAction::Chat(message),
        ServerboundPacket::PlayerGround { on_ground } => PlayerAction::Ground { on_ground },
        ServerboundPacket::PlayerPosition { x, y, z, on_ground } => {
            PlayerAction::Move { x, y, z, on_ground }
        }
        ServerboundPacket::PlayerLook {
            yaw,
            pitch,
            on_ground,
        } => PlayerAction::Look {
            yaw,
            pitch,
            on_ground,
        },
        ServerboundPacket::PlayerPositionLook {
            x,
            y,
            z,
            yaw,
            pitch,
            on_ground,
        } => PlayerAction::MoveLook {
            x,
            y,
            z,
            yaw,
            pitch,
            on_ground,
        },
        ServerboundPacket::Animation => PlayerAction::SwingArm,
        ServerboundPacket::PlayerDigging {
            status,
            location,
            face,
        } => PlayerAction::Dig {
            status,
            location,
            face,
        },
        ServerboundPacket::BlockPlacement {
            location,
            face,
            held_item,
            cursor,
        } => PlayerAction::PlaceBlock {
            location,
            face,
            held_item,
            cursor,
        },
        ServerboundPacket::HeldItemChange { slot } => PlayerAction::SelectSlot(slot),
        // The entity id is always the sender's own
        ServerboundPacket::EntityAction {
            action, jump_boost, ..
        } => PlayerAction::EntityAction { action, jump_boost },
        ServerboundPacket::CreativeInventoryAction { slot, item } => {
            PlayerAction::CreativeSlot { slot, item }
        }
        ServerboundPacket::ClientSettings {
            locale,
            view_distance,
            chat_mode,
            chat_colors,
            skin_parts,
        } => PlayerAction::Settings {
            locale,
            view_distance,
            chat_mode,
            chat_colors,
            skin_parts,
        },
        ServerboundPacket::ClientStatus { action } => PlayerAction::ClientStatus(action),
        ServerboundPacket::PluginMessage { channel, data } => {
            PlayerAction::PluginMessage { channel, data }
        }
        other => {
            return Err(ProtocolError::HandshakeViolation(format!(
                "{:?} is not a play packet",
                other.kind()
            )))
        }
    };
    Ok(action)
}
