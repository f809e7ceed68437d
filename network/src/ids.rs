gtfs::string_id!(NodeID);
gtfs::string_id!(SectionID);
// Stops registered on the road network. Usually the same as the feed's stop ID, but not always.
gtfs::string_id!(RoadStopID);
