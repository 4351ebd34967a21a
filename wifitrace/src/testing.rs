/// Three probes, the second of which lost its echo column.
pub(crate) const CAPTURE_ONE_MALFORMED: &str = "\
number, sent, received, echo, rtt, up_t, down_t, phase
0, 1000, 1500, 1400, 400, 500, -100, 0
1, 21000, 21600, 21450, 450, 600, -150, 0
2, 41000, 41700, , 520, 700, -180, 0
";

/// A capture taken with a phase estimate that is 300 units off.
pub(crate) const CAPTURE_PHASE_OFF: &str = "\
number,sent,received,echo,rtt,up_t,down_t,phase
0,1000,1500,1400,400,500,-100,0
1,5000,5900,5850,850,900,-50,0
2,9000,0,0,0,0,0,0
";

/// Echoes arriving in bursts, as produced by the duplicate-echo capture artifact.
pub(crate) const CAPTURE_BURSTY_ECHO: &str = "\
number,sent,received,echo,rtt,up_t,down_t,phase
0,9000,9600,10000,1000,600,400,0
1,9100,9700,10500,1400,600,800,0
2,9200,9800,11001,1801,600,1201,0
3,9300,9900,11500,2200,600,1600,0
";

/// An older capture layout: the echo timestamp sits in `down_t` and `echo` is zero.
pub(crate) const CAPTURE_LEGACY: &str = "\
number,sent,received,echo,rtt,up_t,down_t,phase
0,1000,1300,0,500,300,1500,0
";
