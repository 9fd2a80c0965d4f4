use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub drivers_online: IntGauge,
    pub active_rides: IntGauge,
    pub bookings_total: IntCounterVec,
    pub broadcasts_total: IntCounter,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let drivers_online = IntGauge::new("drivers_online", "Current number of online drivers")
            .expect("valid drivers_online metric");

        let active_rides = IntGauge::new("active_rides", "Current number of in-memory rides")
            .expect("valid active_rides metric");

        let bookings_total = IntCounterVec::new(
            Opts::new("bookings_total", "Total booking attempts by outcome"),
            &["outcome"],
        )
        .expect("valid bookings_total metric");

        // Pre-initialize every outcome child so the family is exported
        // from process start (TextEncoder omits a vec with no children).
        for outcome in ["success", "invalid", "duplicate", "error"] {
            bookings_total.with_label_values(&[outcome]);
        }

        let broadcasts_total = IntCounter::new(
            "broadcasts_total",
            "Total events broadcast to all connections",
        )
        .expect("valid broadcasts_total metric");

        registry
            .register(Box::new(drivers_online.clone()))
            .expect("register drivers_online");
        registry
            .register(Box::new(active_rides.clone()))
            .expect("register active_rides");
        registry
            .register(Box::new(bookings_total.clone()))
            .expect("register bookings_total");
        registry
            .register(Box::new(broadcasts_total.clone()))
            .expect("register broadcasts_total");

        Self {
            registry,
            drivers_online,
            active_rides,
            bookings_total,
            broadcasts_total,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
