use crate::app::Message;
use crate::visualization::{SpectrumView, WaveformView};
use plotters::chart::ChartBuilder;
use plotters::element::Circle;
use plotters::series::LineSeries;
use plotters::style::{Color, RGBColor, BLUE, RED};
use plotters_iced::{Chart, DrawingBackend};

// ECG Chart
pub struct EcgChart<'a> {
    pub view: &'a WaveformView,
}

impl<'a> Chart<Message> for EcgChart<'a> {
    type State = ();

    fn build_chart<DB: DrawingBackend>(&self, _state: &Self::State, mut builder: ChartBuilder<DB>) {
        let view = self.view;
        let (min_time, max_time) = view.x_range;
        let (min_volts, max_volts) = view.y_range;

        let mut chart = builder
            .margin(15)
            .caption("ECG Signal", ("sans-serif", 20))
            .x_label_area_size(30)
            .y_label_area_size(40)
            .build_cartesian_2d(min_time..max_time, min_volts..max_volts)
            .expect("Failed to build chart");

        chart.plotting_area().fill(&RGBColor(245, 245, 240)).expect("Failed to fill background");

        chart.configure_mesh()
            .axis_style(RGBColor(60, 60, 60))
            .x_desc("Time (s)")
            .y_desc("Voltage (V)")
            .draw().expect("Failed to draw mesh");

        chart
            .draw_series(LineSeries::new(view.points.iter().copied(), &BLUE))
            .expect("Failed to draw series");

        // R-wave markers
        chart
            .draw_series(
                view.peaks
                    .iter()
                    .map(|&(time, volts)| Circle::new((time, volts), 4, RED.filled())),
            )
            .expect("Failed to draw peaks");
    }
}

// Magnitude spectrum with the dominant components marked
pub struct SpectrumChart<'a> {
    pub view: &'a SpectrumView,
}

impl<'a> Chart<Message> for SpectrumChart<'a> {
    type State = ();

    fn build_chart<DB: DrawingBackend>(&self, _state: &Self::State, mut builder: ChartBuilder<DB>) {
        let view = self.view;
        let (min_freq, max_freq) = view.x_range;
        let (min_mag, max_mag) = view.y_range;

        let mut chart = builder
            .margin(15)
            .caption("FFT Spectrum", ("sans-serif", 20))
            .x_label_area_size(30)
            .y_label_area_size(40)
            .build_cartesian_2d(min_freq..max_freq, min_mag..max_mag)
            .expect("Failed to build chart");

        chart.configure_mesh()
            .axis_style(RGBColor(60, 60, 60))
            .x_desc("Frequency (Hz)")
            .y_desc("Magnitude")
            .draw().expect("Failed to draw mesh");

        chart
            .draw_series(LineSeries::new(view.points.iter().copied(), &RGBColor(255, 100, 100)))
            .expect("Failed to draw spectrum");

        chart
            .draw_series(
                view.dominant
                    .iter()
                    .map(|&(freq, mag)| Circle::new((freq, mag), 5, RGBColor(50, 220, 50).filled())),
            )
            .expect("Failed to draw dominant components");
    }
}
