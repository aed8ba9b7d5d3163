use std::io::Write;

use ahash::RandomState;
use anyhow::Result;
use hashbrown::HashMap;

use crate::measurement::Measurement;
use crate::shard::Shard;

type MeasurementsMap<'a> = HashMap<&'a [u8], Measurement, RandomState>;

pub struct Merged<'a> {
    measurements: MeasurementsMap<'a>
}

impl<'a> Merged<'a> {
    pub fn from_shards<I>(shards: I) -> Self
    where
        I: IntoIterator<Item = &'a Shard>
    {
        let mut measurements = MeasurementsMap::default();
        for shard in shards {
            merge(&mut measurements, shard);
        }
        Self { measurements }
    }

    pub fn get(&self, key: &[u8]) -> Option<&Measurement> {
        self.measurements.get(key)
    }

    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    pub fn sorted(&self) -> Vec<(&'a [u8], Measurement)> {
        let mut weather_stations: Vec<(&[u8], Measurement)> = self
            .measurements
            .iter()
            .map(| (station, measurement) | (*station, *measurement))
            .collect();
        weather_stations.sort_unstable_by_key(| item | item.0);
        weather_stations
    }

    pub fn write_output<W: Write>(&self, out: &mut W) -> Result<()> {
        let weather_stations = self.sorted();
        let mut weather_iter = weather_stations.into_iter();
        let Some((first_station, first_weather)) = weather_iter.next() else {
            return Ok(());
        };

        write!(out, "{{")?;
        out.write_all(first_station)?;
        write!(out, "={first_weather}")?;
        for (station, weather) in weather_iter {
            write!(out, ", ")?;
            out.write_all(station)?;
            write!(out, "={weather}")?;
        }
        writeln!(out, "}}")?;
        out.flush()?;
        Ok(())
    }

    pub fn format_output(&self) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        self.write_output(&mut output)?;
        Ok(output)
    }
}

fn merge<'a>(map_one: &mut MeasurementsMap<'a>, shard: &'a Shard) {
    shard
        .iter()
        .for_each(
            | (key, value) | {
                debug_assert!(!value.is_empty());
                map_one
                    .entry(key)
                    .and_modify(| measurement | measurement.merge(value))
                    .or_insert(*value);
            }
        );
}
