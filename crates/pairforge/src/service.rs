//! Application-layer request handling.
//!
//! Both the matchmaking connection (after placement) and each room's own
//! endpoint answer request lines through a [`RequestHandler`]. The server
//! only knows the trait; [`LobbyGreeter`] and [`RoomGreeter`] are the
//! placeholder implementations until real game traffic exists.

use pairforge_protocol::{PlayerId, RoomId};
use pairforge_room::RoomInfo;

/// Which endpoint a request arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// The matchmaking connection the player was placed from.
    Lobby,
    /// A room's own endpoint.
    Room(RoomId),
}

/// One request line plus what the server knows about its context.
#[derive(Debug, Clone)]
pub struct Request {
    pub endpoint: Endpoint,
    /// The sending player, when the endpoint knows it.
    pub player: Option<PlayerId>,
    /// Membership of the relevant room at the time of the request.
    pub room: Option<RoomInfo>,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub body: String,
}

impl Response {
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }
}

/// Answers requests. Called from connection tasks, so implementations
/// must be cheap and must not block.
pub trait RequestHandler: Send + Sync + 'static {
    fn handle(&self, request: &Request) -> Response;
}

impl<F> RequestHandler for F
where
    F: Fn(&Request) -> Response + Send + Sync + 'static,
{
    fn handle(&self, request: &Request) -> Response {
        self(request)
    }
}

/// Placeholder handler for the matchmaking connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct LobbyGreeter;

impl RequestHandler for LobbyGreeter {
    fn handle(&self, request: &Request) -> Response {
        let who = request
            .player
            .map_or_else(|| "player".to_string(), |p| p.to_string());
        match &request.room {
            Some(room) => Response::new(format!(
                "hello {who}, you are in room {} ({}/{})",
                room.room_id,
                room.members.len(),
                room.capacity
            )),
            None => Response::new(format!("hello {who}")),
        }
    }
}

/// Placeholder handler for a room's own endpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoomGreeter;

impl RequestHandler for RoomGreeter {
    fn handle(&self, request: &Request) -> Response {
        let Some(room) = &request.room else {
            return Response::new("hello from an unknown room");
        };
        let members: Vec<String> =
            room.members.iter().map(ToString::to_string).collect();
        Response::new(format!(
            "hello from room {}: {} ({}/{})",
            room.room_id,
            members.join(", "),
            room.members.len(),
            room.capacity
        ))
    }
}
