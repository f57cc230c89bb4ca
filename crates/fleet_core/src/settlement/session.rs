use super::error::SettlementError;
use super::outcome::SettlementResult;
use super::{ActiveTrip, TripSettlement};

/// In-memory "current trip" of a signed-in driver.
#[derive(Debug, Default)]
pub struct DriverSession {
    current: Option<ActiveTrip>,
}

impl DriverSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `trip` current, returning whatever was current before.
    pub fn begin(&mut self, trip: ActiveTrip) -> Option<ActiveTrip> {
        self.current.replace(trip)
    }

    pub fn current(&self) -> Option<&ActiveTrip> {
        self.current.as_ref()
    }

    /// Settle the current trip. The trip stays current unless every saga step
    /// committed, so the driver can retry a partial close-out. A trip that was
    /// closed elsewhere is refused and dropped from the session.
    pub fn end_current_trip(
        &mut self,
        settlement: &TripSettlement<'_>,
    ) -> Result<SettlementResult, SettlementError> {
        let active = self.current.as_ref().ok_or(SettlementError::NoActiveTrip)?;
        match settlement.settle(active) {
            Ok(result) => {
                if result.is_complete() {
                    self.current = None;
                }
                Ok(result)
            }
            Err(error @ SettlementError::TripAlreadyClosed { .. }) => {
                self.current = None;
                Err(error)
            }
            Err(error) => Err(error),
        }
    }
}
