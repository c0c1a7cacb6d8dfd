use serde::{Deserialize, Serialize};
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};


// Wall-clock time for chat timestamps. Never used for timers: those take `instant::Instant`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UtcDateTime(PrimitiveDateTime);

impl UtcDateTime {
    pub fn now() -> Self {
        let now = OffsetDateTime::now_utc();
        Self(PrimitiveDateTime::new(now.date(), now.time()))
    }

    // "14:03", as shown next to a chat message.
    pub fn to_clock_string(self) -> String {
        self.0
            .format(format_description!("[hour]:[minute]"))
            .unwrap_or_else(|_| "??:??".to_owned())
    }
}

impl From<PrimitiveDateTime> for UtcDateTime {
    fn from(pdt: PrimitiveDateTime) -> Self { Self(pdt) }
}


#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn clock_string() {
        let morning = UtcDateTime::from(datetime!(2024-05-01 9:07:30));
        let evening = UtcDateTime::from(datetime!(2024-05-01 21:45));
        assert_eq!(morning.to_clock_string(), "09:07");
        assert_eq!(evening.to_clock_string(), "21:45");
        assert!(morning < evening);
    }
}
