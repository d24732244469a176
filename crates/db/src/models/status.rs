//! Status helper enums mapping to SMALLSERIAL/SMALLINT lookup tables.
//!
//! Each enum variant's discriminant matches the seed data order (1-based)
//! in the corresponding `*_statuses` database table.

use riskcast_core::result_state::ResultStatus;

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:expr ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }

            /// Look up the variant for a database status ID.
            pub fn from_id(id: StatusId) -> Option<Self> {
                match id {
                    $( v if v == $val => Some(Self::$variant), )+
                    _ => None,
                }
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }
    };
}

define_status_enum! {
    /// Weather result lifecycle status.
    WeatherResultStatus {
        Pending = 1,
        Processing = 2,
        Completed = 3,
        Failed = 4,
    }
}

define_status_enum! {
    /// Background job queue status.
    JobStatus {
        Queued = 1,
        Running = 2,
        Completed = 3,
        Failed = 4,
    }
}

impl From<WeatherResultStatus> for ResultStatus {
    fn from(value: WeatherResultStatus) -> Self {
        match value {
            WeatherResultStatus::Pending => ResultStatus::Pending,
            WeatherResultStatus::Processing => ResultStatus::Processing,
            WeatherResultStatus::Completed => ResultStatus::Completed,
            WeatherResultStatus::Failed => ResultStatus::Failed,
        }
    }
}

impl From<ResultStatus> for WeatherResultStatus {
    fn from(value: ResultStatus) -> Self {
        match value {
            ResultStatus::Pending => WeatherResultStatus::Pending,
            ResultStatus::Processing => WeatherResultStatus::Processing,
            ResultStatus::Completed => WeatherResultStatus::Completed,
            ResultStatus::Failed => WeatherResultStatus::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_match_seed_order() {
        assert_eq!(WeatherResultStatus::Pending.id(), 1);
        assert_eq!(WeatherResultStatus::Failed.id(), 4);
        assert_eq!(JobStatus::Queued.id(), 1);
        assert_eq!(StatusId::from(JobStatus::Completed), 3);
    }

    #[test]
    fn from_id_round_trips_and_rejects_unknown() {
        for status in [
            WeatherResultStatus::Pending,
            WeatherResultStatus::Processing,
            WeatherResultStatus::Completed,
            WeatherResultStatus::Failed,
        ] {
            assert_eq!(WeatherResultStatus::from_id(status.id()), Some(status));
        }
        assert_eq!(WeatherResultStatus::from_id(0), None);
        assert_eq!(JobStatus::from_id(5), None);
    }

    #[test]
    fn maps_to_domain_status() {
        assert_eq!(
            ResultStatus::from(WeatherResultStatus::Processing),
            ResultStatus::Processing
        );
        assert_eq!(
            WeatherResultStatus::from(ResultStatus::Completed),
            WeatherResultStatus::Completed
        );
    }
}
