//! S-expression [`MessageDecoder`] for the soccer server protocol.
//!
//! Four message kinds drive the agent:
//!
//! | Message      | Event                                   |
//! |--------------|-----------------------------------------|
//! | `init`       | [`WorldUpdate::Joined`]                 |
//! | `hear` (referee) | [`WorldUpdate::Referee`]            |
//! | `see`        | [`WorldUpdate::Sight`]                  |
//! | `sense_body` | [`Event::CycleBoundary`]                |
//!
//! `error` replies become [`DecodeError::Server`]; every other well-formed
//! message is reported as [`Event::Unrecognized`].

use kickline_core::link::{DecodeError, MessageDecoder};
use kickline_types::{
    BallSighting, EnemySighting, Event, PlayMode, Side, Sight, WorldUpdate, normalize_degrees,
};
use tracing::trace;

use crate::landmarks::{LandmarkSighting, landmark, localize};
use crate::sexp::{self, Sexp};

/// Decoder state for one session.
///
/// Seen directions are relative to the head. The decoder remembers the
/// latest neck angle from `sense_body` so it can report directions relative
/// to the body, which is what the policy turns and kicks against.
#[derive(Debug, Clone)]
pub struct SexpDecoder {
    team: String,
    neck: f64,
}

impl SexpDecoder {
    /// Create a decoder for a player of `team`.
    pub fn new(team: impl Into<String>) -> Self {
        Self {
            team: team.into(),
            neck: 0.0,
        }
    }

    /// The last neck angle reported by `sense_body`, in degrees.
    pub const fn neck(&self) -> f64 {
        self.neck
    }

    fn decode_text(&mut self, text: &str) -> Result<Event, DecodeError> {
        let expr = sexp::parse(text).map_err(|err| DecodeError::Malformed {
            reason: err.to_string(),
        })?;
        let items = expr.as_list().ok_or_else(|| malformed("message is not a list"))?;
        let head = items
            .first()
            .and_then(Sexp::as_atom)
            .ok_or_else(|| malformed("message has no head"))?;
        let rest = items.get(1..).unwrap_or_default();

        match head {
            "init" => decode_init(rest),
            "hear" => decode_hear(rest),
            "see" => self.decode_see(rest),
            "sense_body" => self.decode_sense_body(rest),
            "error" => Err(DecodeError::Server {
                message: rest
                    .iter()
                    .filter_map(Sexp::as_atom)
                    .collect::<Vec<_>>()
                    .join(" "),
            }),
            other => {
                trace!(head = other, "unrecognized message");
                Ok(Event::Unrecognized {
                    head: other.to_owned(),
                })
            }
        }
    }

    fn decode_sense_body(&mut self, rest: &[Sexp]) -> Result<Event, DecodeError> {
        let time = time_of(rest)?;
        if let Some(neck) = rest
            .iter()
            .filter(|item| item.head() == Some("head_angle"))
            .find_map(|item| item.as_list().and_then(|l| l.get(1)).and_then(Sexp::as_f64))
        {
            self.neck = neck;
        }
        Ok(Event::CycleBoundary { time })
    }

    fn decode_see(&self, rest: &[Sexp]) -> Result<Event, DecodeError> {
        let time = time_of(rest)?;
        let mut sight = Sight {
            time,
            ..Sight::default()
        };
        let mut landmarks = Vec::new();

        for object in rest.iter().skip(1) {
            let Some(seen) = SeenObject::read(object) else {
                continue;
            };
            let Some(distance) = seen.distance else {
                continue;
            };
            let body_direction = normalize_degrees(seen.direction + self.neck);

            match seen.name.as_slice() {
                ["b" | "B"] => {
                    sight.ball = Some(BallSighting {
                        distance,
                        direction: body_direction,
                    });
                }
                ["p", team, ..] if *team != self.team => {
                    sight.enemies.push(EnemySighting {
                        distance,
                        angle: body_direction,
                    });
                }
                ["f", name @ ..] => {
                    if let Some(position) = landmark(false, name) {
                        landmarks.push(LandmarkSighting {
                            position,
                            distance,
                            direction: seen.direction,
                        });
                    }
                }
                ["g", name @ ..] => {
                    if let Some(position) = landmark(true, name) {
                        landmarks.push(LandmarkSighting {
                            position,
                            distance,
                            direction: seen.direction,
                        });
                    }
                }
                _ => {}
            }
        }

        sight.pose = localize(&landmarks, self.neck);
        Ok(Event::WorldUpdate(WorldUpdate::Sight(sight)))
    }
}

impl MessageDecoder for SexpDecoder {
    fn decode(&mut self, payload: &[u8]) -> Result<Event, DecodeError> {
        let text = std::str::from_utf8(payload).map_err(|_err| DecodeError::NotUtf8)?;
        self.decode_text(text)
    }
}

// ---------------------------------------------------------------------------
// Message bodies
// ---------------------------------------------------------------------------

fn decode_init(rest: &[Sexp]) -> Result<Event, DecodeError> {
    let side = rest
        .first()
        .and_then(Sexp::as_atom)
        .and_then(Side::from_tag)
        .ok_or_else(|| malformed("init without a side"))?;
    let uniform_number = rest
        .get(1)
        .and_then(Sexp::as_atom)
        .and_then(|n| n.parse::<u8>().ok())
        .ok_or_else(|| malformed("init without a uniform number"))?;
    let play_mode = rest
        .get(2)
        .and_then(Sexp::as_atom)
        .map_or(PlayMode::BeforeKickOff, parse_play_mode);

    Ok(Event::WorldUpdate(WorldUpdate::Joined {
        side,
        uniform_number,
        play_mode,
    }))
}

fn decode_hear(rest: &[Sexp]) -> Result<Event, DecodeError> {
    let time = time_of(rest)?;
    let sender = rest.get(1).and_then(Sexp::as_atom);
    let message = rest.get(2).and_then(Sexp::as_atom);

    match (sender, message) {
        (Some("referee"), Some(mode)) => Ok(Event::WorldUpdate(WorldUpdate::Referee {
            time,
            play_mode: parse_play_mode(mode),
        })),
        _ => Ok(Event::Unrecognized {
            head: String::from("hear"),
        }),
    }
}

/// Referee modes that award a restart, by prefix before the side tag.
const RESTARTS: [&str; 5] = [
    "free_kick_",
    "kick_in_",
    "corner_kick_",
    "goal_kick_",
    "indirect_free_kick_",
];

/// Map a referee play mode onto the modes the policy distinguishes.
pub fn parse_play_mode(mode: &str) -> PlayMode {
    match mode {
        "before_kick_off" => return PlayMode::BeforeKickOff,
        "play_on" => return PlayMode::PlayOn,
        _ => {}
    }

    if let Some(side) = mode.strip_prefix("kick_off_").and_then(Side::from_tag) {
        return PlayMode::KickOff(side);
    }

    if let Some(side) = RESTARTS
        .iter()
        .find_map(|prefix| mode.strip_prefix(prefix).and_then(Side::from_tag))
    {
        return PlayMode::Restart(side);
    }

    // goal_l_3: goal for the left side, third of the match.
    if let Some(side) = mode
        .strip_prefix("goal_")
        .and_then(|tail| tail.split('_').next())
        .and_then(Side::from_tag)
    {
        return PlayMode::Goal(side);
    }

    PlayMode::Other(mode.to_owned())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// One `((name ...) distance direction ...)` entry of a `see` message.
struct SeenObject<'a> {
    name: Vec<&'a str>,
    distance: Option<f64>,
    direction: f64,
}

impl<'a> SeenObject<'a> {
    fn read(object: &'a Sexp) -> Option<Self> {
        let parts = object.as_list()?;
        let name = parts
            .first()?
            .as_list()?
            .iter()
            .map(Sexp::as_atom)
            .collect::<Option<Vec<_>>>()?;
        let numbers: Vec<f64> = parts
            .iter()
            .skip(1)
            .map_while(Sexp::as_f64)
            .collect();

        // A lone number is a direction without a distance.
        match numbers.as_slice() {
            [] => None,
            [direction] => Some(Self {
                name,
                distance: None,
                direction: *direction,
            }),
            [distance, direction, ..] => Some(Self {
                name,
                distance: Some(*distance),
                direction: *direction,
            }),
        }
    }
}

fn time_of(rest: &[Sexp]) -> Result<u32, DecodeError> {
    rest.first()
        .and_then(Sexp::as_atom)
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| malformed("missing cycle time"))
}

fn malformed(reason: &str) -> DecodeError {
    DecodeError::Malformed {
        reason: reason.to_owned(),
    }
}
