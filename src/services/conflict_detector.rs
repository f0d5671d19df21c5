use crate::models::occurrence::{ConflictParty, ExistingBooking, Occurrence, OccurrenceConflict};
use crate::services::schedule_utils;

/// Flags proposed occurrences that overlap already-booked time ranges on
/// the caregiver's or the client's calendar. The two calendars are
/// checked independently and each yields its own finding.
///
/// Bookings are sorted once and swept against occurrences sorted by start
/// instant, so a multi-month batch against a busy calendar stays around
/// O(n log n) instead of a nested rescan.
pub struct ConflictDetector;

impl ConflictDetector {
    pub fn detect(
        occurrences: &[Occurrence],
        caregiver_bookings: &[ExistingBooking],
        client_bookings: &[ExistingBooking],
    ) -> Vec<OccurrenceConflict> {
        let mut conflicts =
            Self::sweep(occurrences, caregiver_bookings, ConflictParty::Caregiver);
        conflicts.extend(Self::sweep(
            occurrences,
            client_bookings,
            ConflictParty::Client,
        ));
        conflicts.sort_by(|a, b| (a.date, a.party.as_str()).cmp(&(b.date, b.party.as_str())));
        conflicts
    }

    fn sweep(
        occurrences: &[Occurrence],
        bookings: &[ExistingBooking],
        party: ConflictParty,
    ) -> Vec<OccurrenceConflict> {
        if occurrences.is_empty() || bookings.is_empty() {
            return Vec::new();
        }

        let mut sorted_occurrences: Vec<&Occurrence> = occurrences.iter().collect();
        sorted_occurrences.sort_by_key(|occ| occ.start_at);

        let mut sorted_bookings: Vec<&ExistingBooking> = bookings.iter().collect();
        sorted_bookings.sort_by_key(|booking| booking.start_at);

        let mut conflicts = Vec::new();
        let mut lower = 0usize;

        for occurrence in sorted_occurrences {
            // Bookings ending at or before this start can never overlap
            // this or any later occurrence.
            while lower < sorted_bookings.len()
                && sorted_bookings[lower].end_at <= occurrence.start_at
            {
                lower += 1;
            }

            let mut index = lower;
            while index < sorted_bookings.len()
                && sorted_bookings[index].start_at < occurrence.end_at
            {
                let booking = sorted_bookings[index];
                if schedule_utils::overlaps(
                    occurrence.start_at,
                    occurrence.end_at,
                    booking.start_at,
                    booking.end_at,
                ) {
                    conflicts.push(OccurrenceConflict {
                        date: occurrence.date,
                        party,
                        booking_id: booking.id.clone(),
                    });
                    break;
                }
                index += 1;
            }
        }

        conflicts
    }
}
